// T-shirt designer pricing.
//
// price = base + 2 (non-white shirt) + 1.5 per canvas object

use rust_decimal::Decimal;

use crate::errors::{AppError, Result};
use crate::models::dto::Design;
use crate::utils::money::round_cents;

pub fn default_base_price() -> Decimal {
    Decimal::new(1999, 2)
}

fn colored_shirt_surcharge() -> Decimal {
    Decimal::new(2, 0)
}

fn price_per_object() -> Decimal {
    Decimal::new(15, 1)
}

pub fn is_white(color: &str) -> bool {
    matches!(
        color.trim().to_ascii_lowercase().as_str(),
        "white" | "#fff" | "#ffffff"
    )
}

/// Quote for the designer page: the submitted base price, or the default one.
/// Orders never go through this; they use [`price_on_base`] with a server-side base.
pub fn design_price(design: &Design) -> Result<Decimal> {
    price_on_base(design, design.base_price.unwrap_or_else(default_base_price))
}

pub fn price_on_base(design: &Design, base: Decimal) -> Result<Decimal> {
    if base < Decimal::ZERO {
        return Err(AppError::Validation("Base price cannot be negative".to_string()));
    }

    let surcharge = if is_white(&design.color) {
        Decimal::ZERO
    } else {
        colored_shirt_surcharge()
    };
    let objects = Decimal::from(design.objects.len() as u64) * price_per_object();

    Ok(round_cents(base + surcharge + objects))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dto::DesignObject;
    use serde_json::Map;

    fn design(color: &str, objects: usize, base_price: Option<Decimal>) -> Design {
        Design {
            base_price,
            color: color.to_string(),
            objects: (0..objects)
                .map(|_| DesignObject { kind: "text".to_string(), properties: Map::new() })
                .collect(),
        }
    }

    #[test]
    fn plain_white_shirt_costs_base_price() {
        assert_eq!(design_price(&design("white", 0, None)).unwrap(), Decimal::new(1999, 2));
        assert_eq!(design_price(&design("#FFFFFF", 0, None)).unwrap(), Decimal::new(1999, 2));
    }

    #[test]
    fn colored_shirt_with_objects() {
        // 19.99 + 2 + 3 * 1.5
        assert_eq!(design_price(&design("black", 3, None)).unwrap(), Decimal::new(2649, 2));
    }

    #[test]
    fn custom_base_price() {
        let price = design_price(&design("white", 2, Some(Decimal::new(25, 0)))).unwrap();
        assert_eq!(price, Decimal::new(28, 0));
    }

    #[test]
    fn server_base_ignores_submitted_base() {
        let cheap = design("white", 1, Some(Decimal::ZERO));
        assert_eq!(price_on_base(&cheap, default_base_price()).unwrap(), Decimal::new(2149, 2));
    }

    #[test]
    fn negative_base_is_rejected() {
        assert!(design_price(&design("white", 0, Some(Decimal::new(-1, 0)))).is_err());
    }

    #[test]
    fn design_objects_keep_canvas_properties() {
        let json = r#"{"color":"red","objects":[{"type":"text","text":"hi","left":12}]}"#;
        let design: Design = serde_json::from_str(json).unwrap();
        assert_eq!(design.objects[0].kind, "text");
        assert_eq!(design.objects[0].properties["text"], "hi");
        assert_eq!(design_price(&design).unwrap(), Decimal::new(2349, 2));
    }
}
