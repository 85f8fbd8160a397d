use crate::{
    error::{AppError, AppResult},
    models::{DeliveryOption, OrderItem},
};

/// Fixed sales tax applied to the discounted subtotal.
pub const TAX_RATE_PERCENT: i64 = 8;

/// Student discount on every line for `@duocuc.cl` accounts.
pub const STUDENT_DISCOUNT_PERCENT: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: i64,
    pub duoc_discount: i64,
    pub tax: i64,
    pub shipping_cost: i64,
    pub total: i64,
}

impl OrderTotals {
    /// Fails with `BadRequest` when any amount leaves the `i64` range.
    pub fn compute(items: &[OrderItem], delivery: DeliveryOption) -> AppResult<Self> {
        let mut subtotal: i64 = 0;
        let mut duoc_discount: i64 = 0;
        for item in items {
            let quantity = i64::from(item.quantity);
            let gross = item.list_price().checked_mul(quantity).ok_or_else(out_of_range)?;
            let discount = (item.list_price() - item.price)
                .checked_mul(quantity)
                .ok_or_else(out_of_range)?;
            subtotal = subtotal.checked_add(gross).ok_or_else(out_of_range)?;
            duoc_discount = duoc_discount.checked_add(discount).ok_or_else(out_of_range)?;
        }

        let taxable = subtotal - duoc_discount;
        let tax = percent_of(taxable, TAX_RATE_PERCENT).ok_or_else(out_of_range)?;
        let shipping_cost = delivery.shipping_cost();
        let total = taxable
            .checked_add(tax)
            .and_then(|t| t.checked_add(shipping_cost))
            .ok_or_else(out_of_range)?;

        Ok(Self {
            subtotal,
            duoc_discount,
            tax,
            shipping_cost,
            total,
        })
    }

    #[cfg(test)]
    fn is_balanced(&self) -> bool {
        self.total == self.subtotal - self.duoc_discount + self.tax + self.shipping_cost
    }
}

/// Unit price after the student discount, rounded half up like the storefront.
pub fn student_price(list_price: i64) -> Option<i64> {
    percent_of(list_price, 100 - STUDENT_DISCOUNT_PERCENT)
}

/// Whole-peso percentage, rounded half up.
fn percent_of(amount: i64, percent: i64) -> Option<i64> {
    amount
        .checked_mul(percent)
        .and_then(|v| v.checked_add(50))
        .map(|v| v / 100)
}

fn out_of_range() -> AppError {
    AppError::BadRequest("order amount out of range".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product_id: &str, quantity: i32, price: i64) -> OrderItem {
        OrderItem {
            product_id: product_id.into(),
            quantity,
            name: format!("Product {product_id}"),
            price,
            image: None,
            original_price: None,
            discount_applied: false,
        }
    }

    #[test]
    fn single_console_standard_delivery() {
        let totals = OrderTotals::compute(&[item("5", 1, 349990)], DeliveryOption::Standard).unwrap();
        assert_eq!(totals.subtotal, 349990);
        assert_eq!(totals.duoc_discount, 0);
        // 27999.2 rounds down
        assert_eq!(totals.tax, 27999);
        assert_eq!(totals.shipping_cost, 2500);
        assert_eq!(totals.total, 349990 + 27999 + 2500);
        assert!(totals.is_balanced());
    }

    #[test]
    fn student_discount_is_taken_before_tax() {
        let mut discounted = item("13", 2, 55992);
        discounted.original_price = Some(69990);
        discounted.discount_applied = true;

        let totals =
            OrderTotals::compute(&[discounted, item("3", 1, 29990)], DeliveryOption::Express).unwrap();
        assert_eq!(totals.subtotal, 69990 * 2 + 29990);
        assert_eq!(totals.duoc_discount, (69990 - 55992) * 2);
        let taxable = 55992 * 2 + 29990;
        assert_eq!(totals.tax, (taxable * 8 + 50) / 100);
        assert_eq!(totals.shipping_cost, 5000);
        assert!(totals.is_balanced());
    }

    #[test]
    fn original_price_without_flag_is_not_a_discount() {
        let mut line = item("7", 1, 599990);
        line.original_price = Some(699990);

        let totals = OrderTotals::compute(&[line], DeliveryOption::Pickup).unwrap();
        assert_eq!(totals.subtotal, 599990);
        assert_eq!(totals.duoc_discount, 0);
        assert_eq!(totals.shipping_cost, 0);
    }

    #[test]
    fn rounding_goes_half_up() {
        assert_eq!(percent_of(1000, 8), Some(80));
        assert_eq!(percent_of(1006, 8), Some(80));
        assert_eq!(percent_of(1007, 8), Some(81));
        assert_eq!(student_price(69990), Some(55992));
        assert_eq!(student_price(29995), Some(23996));
    }

    #[test]
    fn oversized_amounts_are_rejected_instead_of_wrapping() {
        let err = OrderTotals::compute(&[item("5", 3, i64::MAX / 2)], DeliveryOption::Standard)
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = OrderTotals::compute(
            &[item("5", 1, i64::MAX / 4), item("6", 1, i64::MAX / 4)],
            DeliveryOption::Standard,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
