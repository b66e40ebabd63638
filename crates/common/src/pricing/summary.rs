//! Summary Generator - one-sentence Arabic description of a result set

use super::anomaly::AnnotatedPrice;

const NO_RESULTS: &str = "لم أجد نتائج مطابقة لطلبك حالياً.";
const SUSPICIOUS_NOTE: &str = " (تنبيه: هذا السعر يبدو منخفضاً جداً، قد يحتاج لتأكيد)";

/// Describe the best (first) result
pub fn summarize(results: &[AnnotatedPrice]) -> String {
    let Some(best) = results.first() else {
        return NO_RESULTS.to_string();
    };

    let mut text = format!(
        "أفضل سعر متوفر هو {} شيكل في {} ({}).",
        best.price.record.price, best.price.store.name, best.price.store.city
    );
    if best.is_suspicious {
        text.push_str(SUSPICIOUS_NOTE);
    }
    text
}

/// Summary for a shopping list with the summed best prices
pub fn shopping_list_summary(total: f64) -> String {
    format!(
        "وجدت لك أفضل الأسعار لكل صنف في قائمتك. إجمالي التكلفة التقديرية: {} شيكل.",
        total
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{PriceRecord, Product, Store};
    use crate::db::PriceMatch;
    use chrono::Utc;

    fn annotated(price: f64, is_suspicious: bool) -> AnnotatedPrice {
        AnnotatedPrice {
            price: PriceMatch {
                record: PriceRecord {
                    id: 1,
                    product_id: 1,
                    store_id: 1,
                    price,
                    unit: "L".to_string(),
                    updated_at: Utc::now().into(),
                },
                product: Product {
                    id: 1,
                    name: "كوكاكولا".to_string(),
                    brand: None,
                },
                store: Store {
                    id: 1,
                    name: "سوبر ماركت أبو طلال".to_string(),
                    city: "خانيونس".to_string(),
                    district: None,
                },
            },
            is_suspicious,
        }
    }

    #[test]
    fn test_no_results() {
        assert_eq!(summarize(&[]), "لم أجد نتائج مطابقة لطلبك حالياً.");
    }

    #[test]
    fn test_best_result_sentence() {
        assert_eq!(
            summarize(&[annotated(6.5, false)]),
            "أفضل سعر متوفر هو 6.5 شيكل في سوبر ماركت أبو طلال (خانيونس)."
        );
    }

    #[test]
    fn test_whole_prices_render_without_decimals() {
        assert!(summarize(&[annotated(6.0, false)]).contains("هو 6 شيكل"));
    }

    #[test]
    fn test_suspicious_best_gets_warning() {
        let text = summarize(&[annotated(1.0, true)]);
        assert!(text.ends_with(SUSPICIOUS_NOTE));
    }

    #[test]
    fn test_shopping_list_total() {
        assert!(shopping_list_summary(11.5).ends_with("إجمالي التكلفة التقديرية: 11.5 شيكل."));
        assert!(shopping_list_summary(0.0).contains(": 0 شيكل"));
    }
}
