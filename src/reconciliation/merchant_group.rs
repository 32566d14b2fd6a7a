use std::collections::BTreeMap;
use std::fmt;
use serde::Serialize;

/// Grouping key for a line item's or issue's merchant. Lines without a
/// merchant reference all land under the single `Missing` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MerchantKey {
    Id(i64),
    Missing,
}

impl MerchantKey {
    pub fn from_id(merchant_id: Option<i64>) -> Self {
        match merchant_id {
            Some(id) => MerchantKey::Id(id),
            None => MerchantKey::Missing,
        }
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            MerchantKey::Id(id) => Some(*id),
            MerchantKey::Missing => None,
        }
    }
}

impl fmt::Display for MerchantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MerchantKey::Id(id) => write!(f, "{id}"),
            MerchantKey::Missing => write!(f, "no-merchant"),
        }
    }
}

pub const UNKNOWN_MERCHANT_NAME: &str = "Unknown Merchant";

/// Display fields for a merchant after the fallback policy has been applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantDisplay {
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// The single normalization point for merchant display data. A missing or
/// blank name falls back to "Unknown Merchant"; contact fields stay None
/// rather than placeholder strings.
pub fn normalize_merchant(
    name: Option<&str>,
    contact_name: Option<&str>,
    email: Option<&str>,
    phone: Option<&str>,
) -> MerchantDisplay {
    let name = match name.map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => UNKNOWN_MERCHANT_NAME.to_string(),
    };
    MerchantDisplay {
        name,
        contact_name: contact_name.map(|s| s.to_string()),
        email: email.map(|s| s.to_string()),
        phone: phone.map(|s| s.to_string()),
    }
}

/// Groups items by their merchant reference; all merchant-less items share
/// one sentinel group.
pub fn group_by_merchant<T>(
    items: Vec<T>,
    merchant_id: impl Fn(&T) -> Option<i64>,
) -> BTreeMap<MerchantKey, Vec<T>> {
    let mut groups: BTreeMap<MerchantKey, Vec<T>> = BTreeMap::new();
    for item in items {
        let key = MerchantKey::from_id(merchant_id(&item));
        groups.entry(key).or_default().push(item);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        merchant_id: Option<i64>,
    }

    #[test]
    fn merchantless_items_share_one_sentinel_group() {
        let items = vec![
            Probe { merchant_id: None },
            Probe { merchant_id: Some(3) },
            Probe { merchant_id: None },
        ];
        let groups = group_by_merchant(items, |p| p.merchant_id);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&MerchantKey::Missing].len(), 2);
        assert_eq!(groups[&MerchantKey::Id(3)].len(), 1);
    }

    #[test]
    fn sentinel_key_renders_as_no_merchant() {
        assert_eq!(MerchantKey::Missing.to_string(), "no-merchant");
        assert_eq!(MerchantKey::Id(7).to_string(), "7");
    }

    #[test]
    fn blank_name_falls_back_to_unknown_merchant() {
        let d = normalize_merchant(Some("  "), None, Some("a@b.test"), None);
        assert_eq!(d.name, UNKNOWN_MERCHANT_NAME);
        assert_eq!(d.email.as_deref(), Some("a@b.test"));

        let d = normalize_merchant(None, None, None, None);
        assert_eq!(d.name, UNKNOWN_MERCHANT_NAME);
        assert_eq!(d.contact_name, None);
    }

    #[test]
    fn known_merchant_keeps_its_fields() {
        let d = normalize_merchant(Some("Acme Goods"), Some("Jo"), None, Some("555-1212"));
        assert_eq!(d.name, "Acme Goods");
        assert_eq!(d.contact_name.as_deref(), Some("Jo"));
        assert_eq!(d.phone.as_deref(), Some("555-1212"));
    }
}
