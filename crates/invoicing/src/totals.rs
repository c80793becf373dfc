//! Invoice arithmetic.
//!
//! Amounts are plain `f64`. The same functions are used when an invoice is
//! created (to compute the stored total) and when it is read back (to
//! recompute subtotal and tax for display), so both paths agree bit for bit
//! given the same inputs.

/// Subtotal of a single line: `unit_price * quantity`.
pub fn line_subtotal(unit_price: f64, quantity: i32) -> f64 {
    unit_price * f64::from(quantity)
}

/// Aggregated amounts of an invoice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub subtotal: f64,
    pub tax_amount: f64,
    pub total: f64,
}

impl Totals {
    /// Aggregate `(unit_price, quantity)` lines at a tax percentage
    /// (`10.0` means 10%).
    pub fn from_lines<I>(lines: I, tax_percent: f64) -> Self
    where
        I: IntoIterator<Item = (f64, i32)>,
    {
        let subtotal: f64 = lines
            .into_iter()
            .map(|(unit_price, quantity)| line_subtotal(unit_price, quantity))
            .sum();
        Self::from_subtotal(subtotal, tax_percent)
    }

    /// `false` once any amount has overflowed to infinity (or become NaN).
    pub fn is_finite(&self) -> bool {
        self.subtotal.is_finite() && self.tax_amount.is_finite() && self.total.is_finite()
    }

    pub fn from_subtotal(subtotal: f64, tax_percent: f64) -> Self {
        let tax_amount = subtotal * (tax_percent / 100.0);
        Self {
            subtotal,
            tax_amount,
            total: subtotal + tax_amount,
        }
    }
}
