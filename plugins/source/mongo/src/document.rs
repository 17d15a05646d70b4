use chrono::{DateTime, Utc};
use mongodb::bson;
use serde::{Deserialize, Serialize};

use ferry_api::{FerryError, Price, Product};

// ════════════════════════════════════════════════════════════════
//  On-wire document
// ════════════════════════════════════════════════════════════════

/// Документ коллекции `products` как он лежит в MongoDB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDoc {
    pub product_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub created_at: bson::DateTime,
}

impl TryFrom<ProductDoc> for Product {
    type Error = FerryError;

    fn try_from(doc: ProductDoc) -> Result<Self, Self::Error> {
        let price = Price::from_f64(doc.price)
            .map_err(|e| FerryError::decode(format!("product_id {}: {e}", doc.product_id)))?;
        let created_at = DateTime::<Utc>::from_timestamp_millis(doc.created_at.timestamp_millis())
            .ok_or_else(|| {
                FerryError::decode(format!(
                    "product_id {}: created_at out of range: {}",
                    doc.product_id, doc.created_at
                ))
            })?;
        Ok(Product {
            id: doc.product_id,
            name: doc.name,
            description: doc.description,
            price,
            created_at,
        })
    }
}

impl From<&Product> for ProductDoc {
    fn from(p: &Product) -> Self {
        Self {
            product_id: p.id,
            name: p.name.clone(),
            description: p.description.clone(),
            price: p.price.as_f64(),
            created_at: bson::DateTime::from_millis(p.created_at.timestamp_millis()),
        }
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;

    use super::*;
    use ferry_api::ErrorKind;

    #[test]
    fn decodes_seeded_document() {
        let raw = doc! {
            "product_id": 3_i32,
            "name": "Produto Mongo 3",
            "description": "Descrição do produto vindo do Mongo 3.",
            "price": 3.75,
            "created_at": bson::DateTime::from_millis(1_740_830_400_000),
        };
        let parsed: ProductDoc = bson::from_document(raw).unwrap();
        let product = Product::try_from(parsed).unwrap();

        assert_eq!(product.id, 3);
        assert_eq!(product.price.cents(), 375);
        assert_eq!(product.created_at.timestamp_millis(), 1_740_830_400_000);
    }

    #[test]
    fn missing_description_defaults_to_empty() {
        let raw = doc! {
            "product_id": 8_i64,
            "name": "x",
            "price": 1.0,
            "created_at": bson::DateTime::from_millis(0),
        };
        let parsed: ProductDoc = bson::from_document(raw).unwrap();
        assert_eq!(parsed.description, "");
    }

    #[test]
    fn negative_price_is_decode_error() {
        let parsed = ProductDoc {
            product_id: 1,
            name: "x".into(),
            description: String::new(),
            price: -2.5,
            created_at: bson::DateTime::from_millis(0),
        };
        let err = Product::try_from(parsed).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.message().contains("product_id 1"));
    }

    #[test]
    fn wrong_field_type_fails_to_deserialize() {
        let raw = doc! {
            "product_id": 1_i64,
            "name": "x",
            "price": "cheap",
            "created_at": bson::DateTime::from_millis(0),
        };
        assert!(bson::from_document::<ProductDoc>(raw).is_err());
    }
}
