use chrono::{DateTime, Utc};

use crate::FerryError;

// ════════════════════════════════════════════════════════════════
//  Price
// ════════════════════════════════════════════════════════════════

/// Неотрицательная цена с фиксированной точкой: целое число центов.
///
/// Соответствует `NUMERIC(10, 2)` на стороне sink'а. Отрицательные и
/// не-конечные значения отвергаются при конструировании, поэтому любой
/// существующий `Price` валиден.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(i64);

impl Price {
    pub const ZERO: Price = Price(0);

    pub fn from_cents(cents: i64) -> Result<Self, FerryError> {
        if cents < 0 {
            return Err(FerryError::decode(format!("negative price: {cents} cents")));
        }
        Ok(Self(cents))
    }

    /// Округляет до центов (half away from zero). Источник хранит цену
    /// как double, поэтому `1.25 * 3` должен дать ровно `3.75`.
    pub fn from_f64(value: f64) -> Result<Self, FerryError> {
        if !value.is_finite() {
            return Err(FerryError::decode(format!("price is not a finite number: {value}")));
        }
        if value < 0.0 {
            return Err(FerryError::decode(format!("negative price: {value}")));
        }
        let cents = (value * 100.0).round();
        if cents > i64::MAX as f64 {
            return Err(FerryError::decode(format!("price out of range: {value}")));
        }
        Ok(Self(cents as i64))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl std::str::FromStr for Price {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || FerryError::decode(format!("invalid price: '{s}'"));
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() || frac.len() > 2 {
            return Err(bad());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        let whole: i64 = whole.parse().map_err(|_| bad())?;
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| bad())? * 10,
            _ => frac.parse().map_err(|_| bad())?,
        };
        whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac))
            .map(Price)
            .ok_or_else(bad)
    }
}

// ════════════════════════════════════════════════════════════════
//  Product
// ════════════════════════════════════════════════════════════════

/// Запись, которую переносит pipeline: один документ источника → одна
/// строка sink'а.
///
/// После того как reader её построил, запись не изменяется: она
/// перемещается через очередь и потребляется ровно одним worker'ом.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    /// Уникальный ключ в источнике и первичный ключ в sink'е.
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Price,
    /// Назначается источником, не меняется.
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        id: i64,
        name: impl Into<String>,
        description: impl Into<String>,
        price: Price,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            price,
            created_at,
        }
    }
}
