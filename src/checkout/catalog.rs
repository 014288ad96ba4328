use chrono::{DateTime, Months, Utc};

use crate::error::CheckoutError;

/// A purchasable subscription tier. Prices are whole dollars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Package {
    pub name: &'static str,
    pub price: i32,
    pub months: u32,
    pub description: &'static str,
}

pub const ONE_MONTH: &str = "1 Month";
pub const FOUR_MONTHS: &str = "4 Months";
pub const ONE_YEAR: &str = "1 Year";

pub const PACKAGES: [Package; 3] = [
    Package {
        name: ONE_MONTH,
        price: 5,
        months: 1,
        description: "The package will be available for one month, giving you plenty of time to explore its contents and enjoy its benefits before it's gone.",
    },
    Package {
        name: FOUR_MONTHS,
        price: 10,
        months: 4,
        description: "The package will be available for four months, allowing you to fully enjoy and explore its offerings at your own pace.",
    },
    Package {
        name: ONE_YEAR,
        price: 15,
        months: 12,
        description: "This package lasts for an entire year, providing you with a wealth of benefits and experiences to enjoy throughout the months.",
    },
];

/// Exact, case-sensitive lookup.
pub fn find_package(name: &str) -> Result<&'static Package, CheckoutError> {
    PACKAGES
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| CheckoutError::UnknownPackage(name.to_string()))
}

impl Package {
    /// Price in the smallest currency unit.
    pub fn unit_amount(&self) -> i64 {
        i64::from(self.price) * 100
    }

    pub fn product_name(&self) -> String {
        format!("{} Package", self.name)
    }

    /// Calendar-month arithmetic; the day is clamped to the end of shorter months.
    pub fn expiry_from(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        start.checked_add_months(Months::new(self.months))
    }
}
