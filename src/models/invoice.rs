//! Invoice and product-row records.

use chrono::NaiveDate;
use serde::Deserialize;

use super::{de_date, de_f64, de_opt_f64, de_opt_u64, de_u64, de_yn};

/// One invoice as returned by `crm.invoice.list`.
#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    #[serde(rename = "ID", deserialize_with = "de_u64")]
    pub id: u64,
    #[serde(rename = "ACCOUNT_NUMBER", default)]
    pub number: String,
    #[serde(rename = "DATE_INSERT", deserialize_with = "de_date")]
    pub date: NaiveDate,
    #[serde(rename = "PRICE", deserialize_with = "de_f64")]
    pub amount: f64,
    #[serde(rename = "CURRENCY", default)]
    pub currency: String,
    #[serde(rename = "UF_COMPANY_ID", deserialize_with = "de_opt_u64", default)]
    pub company_id: Option<u64>,
    #[serde(rename = "STATUS_ID", default)]
    pub status: String,
}

/// One product row of an invoice, from `crm.invoice.productrows.get`.
#[derive(Debug, Clone, Deserialize)]
pub struct LineItem {
    #[serde(rename = "PRODUCT_NAME", default)]
    pub product_name: String,
    #[serde(rename = "PRICE", deserialize_with = "de_f64")]
    pub price: f64,
    #[serde(rename = "QUANTITY", deserialize_with = "de_f64")]
    pub quantity: f64,
    #[serde(rename = "TAX_RATE", deserialize_with = "de_opt_f64", default)]
    pub tax_rate: Option<f64>,
    #[serde(rename = "TAX_INCLUDED", deserialize_with = "de_yn", default)]
    pub tax_included: bool,
}

impl LineItem {
    /// Row total before any tax adjustment.
    pub fn total(&self) -> f64 {
        self.price * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invoice_decodes_stringly_numbers() {
        let invoice: Invoice = serde_json::from_value(json!({
            "ID": "184",
            "ACCOUNT_NUMBER": "INV-184",
            "DATE_INSERT": "2024-03-15T10:30:00+03:00",
            "PRICE": "12500.50",
            "CURRENCY": "RUB",
            "UF_COMPANY_ID": "31",
            "STATUS_ID": "P"
        }))
        .expect("decode");
        assert_eq!(invoice.id, 184);
        assert_eq!(invoice.number, "INV-184");
        assert_eq!(
            invoice.date,
            NaiveDate::from_ymd_opt(2024, 3, 15).expect("date")
        );
        assert!((invoice.amount - 12500.50).abs() < 1e-9);
        assert_eq!(invoice.company_id, Some(31));
    }

    #[test]
    fn test_invoice_tolerates_literal_json_types() {
        let invoice: Invoice = serde_json::from_value(json!({
            "ID": 184,
            "DATE_INSERT": "2024-03-15",
            "PRICE": 12500.5,
            "UF_COMPANY_ID": null
        }))
        .expect("decode");
        assert_eq!(invoice.id, 184);
        assert_eq!(invoice.company_id, None);
        assert_eq!(invoice.number, "");
    }

    #[test]
    fn test_zero_company_id_means_unassigned() {
        let invoice: Invoice = serde_json::from_value(json!({
            "ID": 1,
            "DATE_INSERT": "2024-01-01",
            "PRICE": "0",
            "UF_COMPANY_ID": "0"
        }))
        .expect("decode");
        assert_eq!(invoice.company_id, None);
    }

    #[test]
    fn test_line_item_total_and_flags() {
        let row: LineItem = serde_json::from_value(json!({
            "PRODUCT_NAME": "Consulting",
            "PRICE": "100.00",
            "QUANTITY": "2.5",
            "TAX_RATE": "20",
            "TAX_INCLUDED": "Y"
        }))
        .expect("decode");
        assert!((row.total() - 250.0).abs() < 1e-9);
        assert_eq!(row.tax_rate, Some(20.0));
        assert!(row.tax_included);
    }

    #[test]
    fn test_line_item_missing_tax_fields() {
        let row: LineItem = serde_json::from_value(json!({
            "PRODUCT_NAME": "Widget",
            "PRICE": 10,
            "QUANTITY": 1
        }))
        .expect("decode");
        assert_eq!(row.tax_rate, None);
        assert!(!row.tax_included);
    }
}
