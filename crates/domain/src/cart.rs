//! Shopping cart.

use common::{Currency, CurrencyMismatch, Money, ProductId};
use thiserror::Error;

use crate::catalog::Product;

/// Largest quantity a single cart item may hold.
///
/// Quantities are persisted and stock is tracked as signed 32-bit integers.
pub const MAX_QUANTITY: u32 = i32::MAX as u32;

/// Errors that can occur while filling a cart.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Invalid quantity: {quantity} (must be between 1 and 2147483647)")]
    InvalidQuantity { quantity: u64 },

    #[error("Amount overflow for product {product_id}")]
    AmountOverflow { product_id: ProductId },

    #[error("Cart currency mismatch: {0}")]
    CurrencyMismatch(#[from] CurrencyMismatch),
}

/// A product and the quantity to order.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub product: Product,
    pub quantity: u32,
    pub line_amount: Money,
}

impl CartItem {
    pub fn unit_price(&self) -> Money {
        self.product.price
    }
}

/// A transient cart, built per checkout and consumed by order placement.
#[derive(Debug, Clone, PartialEq)]
pub struct Cart {
    currency: Currency,
    items: Vec<CartItem>,
}

impl Cart {
    /// Creates an empty cart in the given currency.
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            items: Vec::new(),
        }
    }

    /// Adds a product to the cart.
    ///
    /// Adding a product that is already in the cart increases its quantity.
    /// The merged quantity may not exceed [`MAX_QUANTITY`] and the cart total
    /// must stay representable; a rejected call leaves the cart unchanged.
    pub fn add_item(&mut self, product: Product, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 || quantity > MAX_QUANTITY {
            return Err(CartError::InvalidQuantity {
                quantity: u64::from(quantity),
            });
        }
        if product.price.currency() != self.currency {
            return Err(CartError::CurrencyMismatch(CurrencyMismatch {
                left: self.currency,
                right: product.price.currency(),
            }));
        }

        let existing = self.items.iter().position(|i| i.product.id == product.id);
        let new_quantity = match existing {
            Some(index) => {
                let current = self.items[index].quantity;
                current
                    .checked_add(quantity)
                    .filter(|q| *q <= MAX_QUANTITY)
                    .ok_or(CartError::InvalidQuantity {
                        quantity: u64::from(current) + u64::from(quantity),
                    })?
            }
            None => quantity,
        };

        let overflow = CartError::AmountOverflow {
            product_id: product.id,
        };
        let Some(line_amount) = product.price.checked_multiply(new_quantity) else {
            return Err(overflow);
        };

        // The total must fit with the new line amount in place
        let total = self
            .items
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != existing)
            .try_fold(line_amount.cents(), |sum, (_, item)| {
                sum.checked_add(item.line_amount.cents())
            });
        if total.is_none() {
            return Err(overflow);
        }

        match existing {
            Some(index) => {
                let item = &mut self.items[index];
                item.quantity = new_quantity;
                item.line_amount = line_amount;
            }
            None => self.items.push(CartItem {
                product,
                quantity,
                line_amount,
            }),
        }
        Ok(())
    }

    /// Sums `unit_price * quantity` over all items.
    pub fn calculate_total_amount(&self) -> Money {
        let cents = self.items.iter().map(|i| i.line_amount.cents()).sum();
        Money::from_cents(cents, self.currency)
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the total number of units in the cart.
    pub fn item_quantity(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ProductType, ProductTypeParams};
    use common::{ProductId, ProductNumber, ShopId, TaxRate};

    fn product(price_cents: i64, currency: Currency) -> Product {
        Product {
            id: ProductId::new(),
            shop_id: ShopId::new("shop"),
            item_number: ProductNumber::new("P-001"),
            product_type: ProductType::Physical,
            type_params: ProductTypeParams::default(),
            name: "Mug".to_string(),
            price: Money::from_cents(price_cents, currency),
            tax_rate: TaxRate::from_percent(19),
            processing_required: false,
        }
    }

    #[test]
    fn empty_cart_total_is_zero() {
        let cart = Cart::new(Currency::EUR);
        assert!(cart.is_empty());
        assert_eq!(cart.calculate_total_amount(), Money::zero(Currency::EUR));
    }

    #[test]
    fn total_sums_line_amounts() {
        let mut cart = Cart::new(Currency::EUR);
        cart.add_item(product(1000, Currency::EUR), 3).unwrap();
        cart.add_item(product(250, Currency::EUR), 2).unwrap();

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.calculate_total_amount().cents(), 3500);
        assert_eq!(cart.item_quantity(), 5);
    }

    #[test]
    fn adding_same_product_merges_quantities() {
        let mut cart = Cart::new(Currency::EUR);
        let mug = product(1000, Currency::EUR);
        cart.add_item(mug.clone(), 1).unwrap();
        cart.add_item(mug, 2).unwrap();

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.items()[0].line_amount.cents(), 3000);
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut cart = Cart::new(Currency::EUR);
        let result = cart.add_item(product(1000, Currency::EUR), 0);
        assert_eq!(result, Err(CartError::InvalidQuantity { quantity: 0 }));
        assert!(cart.is_empty());
    }

    #[test]
    fn foreign_currency_is_rejected() {
        let mut cart = Cart::new(Currency::EUR);
        let result = cart.add_item(product(1000, Currency::USD), 1);
        assert!(matches!(result, Err(CartError::CurrencyMismatch(_))));
    }

    #[test]
    fn quantity_above_maximum_is_rejected() {
        let mut cart = Cart::new(Currency::EUR);
        cart.add_item(product(1, Currency::EUR), MAX_QUANTITY).unwrap();
        assert_eq!(cart.items()[0].quantity, MAX_QUANTITY);

        let mut cart = Cart::new(Currency::EUR);
        let result = cart.add_item(product(1, Currency::EUR), 3_000_000_000);
        assert_eq!(
            result,
            Err(CartError::InvalidQuantity {
                quantity: 3_000_000_000
            })
        );
        assert!(cart.is_empty());
    }

    #[test]
    fn merging_beyond_maximum_leaves_item_unchanged() {
        let mut cart = Cart::new(Currency::EUR);
        let mug = product(1, Currency::EUR);
        cart.add_item(mug.clone(), MAX_QUANTITY).unwrap();

        let result = cart.add_item(mug.clone(), 1);
        assert_eq!(
            result,
            Err(CartError::InvalidQuantity {
                quantity: u64::from(MAX_QUANTITY) + 1
            })
        );
        assert_eq!(cart.items()[0].quantity, MAX_QUANTITY);
        assert_eq!(cart.items()[0].line_amount.cents(), i64::from(MAX_QUANTITY));

        let result = cart.add_item(mug, u32::MAX);
        assert!(matches!(result, Err(CartError::InvalidQuantity { .. })));
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn line_amount_overflow_is_rejected() {
        let mut cart = Cart::new(Currency::EUR);
        let expensive = product(i64::MAX / 2, Currency::EUR);
        let result = cart.add_item(expensive.clone(), 3);
        assert_eq!(
            result,
            Err(CartError::AmountOverflow {
                product_id: expensive.id
            })
        );
        assert!(cart.is_empty());
    }

    #[test]
    fn cart_total_overflow_is_rejected() {
        let mut cart = Cart::new(Currency::EUR);
        cart.add_item(product(i64::MAX / 2, Currency::EUR), 1).unwrap();
        cart.add_item(product(i64::MAX / 2, Currency::EUR), 1).unwrap();

        let third = product(i64::MAX / 2, Currency::EUR);
        let result = cart.add_item(third.clone(), 1);
        assert_eq!(
            result,
            Err(CartError::AmountOverflow {
                product_id: third.id
            })
        );
        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.calculate_total_amount().cents(), (i64::MAX / 2) * 2);
    }
}
