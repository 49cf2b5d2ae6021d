//! Invoice ledger calculator.
//!
//! Pure functions deriving an invoice's financial fields from its line items
//! and rate settings, its status from payments, a project's progress from its
//! tasks, and invoice numbers and due dates. Stateless; every caller is a
//! database mutation that runs these inside its own transaction.
//!
//! Monetary values round to 2 decimal places at each assignment
//! (`Decimal::round_dp`, banker's rounding). Inputs are not validated here:
//! negative quantities, prices, and rates pass through unchanged, and
//! overpayment is accepted without clamping.

use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::models::{InvoiceStatus, PaymentTerms};

/// The five derived monetary fields of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub amount_due: Decimal,
}

/// Line amount: `round(quantity * unit_price, 2)`.
pub fn line_amount(quantity: Decimal, unit_price: Decimal) -> Decimal {
    (quantity * unit_price).round_dp(2)
}

/// Recompute the ledger fields from item amounts and rate settings.
///
/// Order matters for rounding parity with stored values:
/// subtotal, then discount, then tax on the discounted base, then total,
/// then amount due.
pub fn recalculate_totals(
    item_amounts: &[Decimal],
    discount_percent: Decimal,
    tax_rate: Decimal,
    amount_paid: Decimal,
) -> LedgerTotals {
    let hundred = Decimal::ONE_HUNDRED;

    let subtotal = item_amounts
        .iter()
        .copied()
        .sum::<Decimal>()
        .round_dp(2);
    let discount_amount = (subtotal * discount_percent / hundred).round_dp(2);
    let taxable = subtotal - discount_amount;
    let tax_amount = (taxable * tax_rate / hundred).round_dp(2);
    let total = (taxable + tax_amount).round_dp(2);
    let amount_due = (total - amount_paid).round_dp(2);

    LedgerTotals {
        subtotal,
        discount_amount,
        tax_amount,
        total,
        amount_due,
    }
}

/// Result of applying a payment to an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
    pub status: InvoiceStatus,
    pub paid_date: Option<NaiveDate>,
}

/// Apply a payment: accumulate `amount_paid`, rederive `amount_due`, and
/// transition status. Fully paid (amount_due <= 0) becomes `Paid` with
/// `paid_date` set exactly once; any positive balance with a nonzero paid
/// amount becomes `PartiallyPaid`. A zero cumulative amount leaves the
/// status untouched.
pub fn apply_payment(
    total: Decimal,
    amount_paid: Decimal,
    status: InvoiceStatus,
    paid_date: Option<NaiveDate>,
    payment_amount: Decimal,
    payment_date: NaiveDate,
) -> PaymentOutcome {
    let amount_paid = amount_paid + payment_amount;
    let amount_due = (total - amount_paid).round_dp(2);

    if amount_due <= Decimal::ZERO {
        PaymentOutcome {
            amount_paid,
            amount_due,
            status: InvoiceStatus::Paid,
            paid_date: paid_date.or(Some(payment_date)),
        }
    } else if amount_paid > Decimal::ZERO {
        PaymentOutcome {
            amount_paid,
            amount_due,
            status: InvoiceStatus::PartiallyPaid,
            paid_date,
        }
    } else {
        PaymentOutcome {
            amount_paid,
            amount_due,
            status,
            paid_date,
        }
    }
}

/// Format the next invoice number for an owner:
/// `INV-<year>-<existing_count + 1, zero-padded to 4 digits>`.
///
/// The count comes from the per-owner per-year counter row, incremented
/// inside the creating transaction, so concurrent creations cannot collide.
pub fn next_invoice_number(existing_count: i64, year: i32) -> String {
    format!("INV-{}-{:04}", year, existing_count + 1)
}

/// Due date derived from issue date and payment terms.
pub fn due_date_from_terms(issue_date: NaiveDate, terms: PaymentTerms) -> NaiveDate {
    issue_date + Duration::days(terms.net_days())
}

/// Project progress percentage: `round(100 * completed / total)`, 0 with no
/// tasks.
pub fn project_progress(completed_tasks: i64, total_tasks: i64) -> i32 {
    if total_tasks <= 0 {
        return 0;
    }
    let pct = Decimal::from(100 * completed_tasks) / Decimal::from(total_tasks);
    pct.round().to_i32().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn totals_follow_discount_then_tax_order() {
        // items 10 x 75.0 and 8 x 85.0, 5% discount, 10% tax
        let amounts = [
            line_amount(dec!(10), dec!(75.0)),
            line_amount(dec!(8), dec!(85.0)),
        ];
        assert_eq!(amounts, [dec!(750.00), dec!(680.00)]);

        let totals = recalculate_totals(&amounts, dec!(5), dec!(10), Decimal::ZERO);
        assert_eq!(totals.subtotal, dec!(1430.00));
        assert_eq!(totals.discount_amount, dec!(71.50));
        assert_eq!(totals.tax_amount, dec!(135.85));
        assert_eq!(totals.total, dec!(1494.35));
        assert_eq!(totals.amount_due, dec!(1494.35));
    }

    #[test]
    fn totals_satisfy_invariants() {
        let amounts = [dec!(19.99), dec!(0.01), dec!(123.45)];
        let totals = recalculate_totals(&amounts, dec!(12.5), dec!(8.25), dec!(10));

        assert_eq!(
            totals.total,
            ((totals.subtotal - totals.discount_amount) + totals.tax_amount).round_dp(2)
        );
        assert_eq!(totals.amount_due, (totals.total - dec!(10)).round_dp(2));
    }

    #[test]
    fn recalculation_is_idempotent() {
        let amounts = [dec!(100.10), dec!(200.20)];
        let first = recalculate_totals(&amounts, dec!(3), dec!(7), dec!(50));
        let second = recalculate_totals(&amounts, dec!(3), dec!(7), dec!(50));
        assert_eq!(first, second);
    }

    #[test]
    fn zero_rates_yield_zero_discount_and_tax() {
        let totals = recalculate_totals(&[dec!(500)], Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        assert_eq!(totals.discount_amount, Decimal::ZERO);
        assert_eq!(totals.tax_amount, Decimal::ZERO);
        assert_eq!(totals.total, dec!(500));
    }

    #[test]
    fn empty_item_list_zeroes_the_ledger() {
        let totals = recalculate_totals(&[], dec!(5), dec!(10), Decimal::ZERO);
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
        assert_eq!(totals.amount_due, Decimal::ZERO);
    }

    #[test]
    fn negative_amounts_pass_through_unvalidated() {
        let totals = recalculate_totals(&[dec!(-100)], Decimal::ZERO, dec!(10), Decimal::ZERO);
        assert_eq!(totals.subtotal, dec!(-100));
        assert_eq!(totals.tax_amount, dec!(-10.00));
        assert_eq!(totals.total, dec!(-110.00));
    }

    #[test]
    fn full_payment_marks_paid_and_stamps_paid_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let outcome = apply_payment(
            dec!(1494.35),
            Decimal::ZERO,
            InvoiceStatus::Sent,
            None,
            dec!(1494.35),
            date,
        );
        assert_eq!(outcome.amount_paid, dec!(1494.35));
        assert_eq!(outcome.amount_due, Decimal::ZERO.round_dp(2));
        assert_eq!(outcome.status, InvoiceStatus::Paid);
        assert_eq!(outcome.paid_date, Some(date));
    }

    #[test]
    fn partial_payment_marks_partially_paid_without_paid_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let outcome = apply_payment(
            dec!(1000),
            Decimal::ZERO,
            InvoiceStatus::Sent,
            None,
            dec!(400),
            date,
        );
        assert_eq!(outcome.amount_due, dec!(600.00));
        assert_eq!(outcome.status, InvoiceStatus::PartiallyPaid);
        assert_eq!(outcome.paid_date, None);
    }

    #[test]
    fn paid_date_is_set_only_once() {
        let first = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let second = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let outcome = apply_payment(
            dec!(100),
            dec!(100),
            InvoiceStatus::Paid,
            Some(first),
            dec!(50),
            second,
        );
        assert_eq!(outcome.paid_date, Some(first));
        assert_eq!(outcome.status, InvoiceStatus::Paid);
    }

    #[test]
    fn overpayment_is_not_clamped() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let outcome = apply_payment(
            dec!(100),
            Decimal::ZERO,
            InvoiceStatus::Sent,
            None,
            dec!(150),
            date,
        );
        assert_eq!(outcome.amount_due, dec!(-50.00));
        assert_eq!(outcome.status, InvoiceStatus::Paid);
    }

    #[test]
    fn zero_payment_leaves_status_untouched() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let outcome = apply_payment(
            dec!(100),
            Decimal::ZERO,
            InvoiceStatus::Sent,
            None,
            Decimal::ZERO,
            date,
        );
        assert_eq!(outcome.status, InvoiceStatus::Sent);
        assert_eq!(outcome.amount_due, dec!(100.00));
    }

    #[test]
    fn invoice_numbers_are_sequential_and_zero_padded() {
        assert_eq!(next_invoice_number(0, 2026), "INV-2026-0001");
        assert_eq!(next_invoice_number(3, 2026), "INV-2026-0004");
        assert_eq!(next_invoice_number(9998, 2026), "INV-2026-9999");
        assert_eq!(next_invoice_number(9999, 2026), "INV-2026-10000");
    }

    #[test]
    fn due_dates_follow_terms_offsets() {
        let issue = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let cases = [
            (PaymentTerms::DueOnReceipt, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            (PaymentTerms::Net7, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()),
            (PaymentTerms::Net15, NaiveDate::from_ymd_opt(2024, 1, 16).unwrap()),
            (PaymentTerms::Net30, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()),
            (PaymentTerms::Net60, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            // Custom never carried a duration; permanent 30-day policy
            (PaymentTerms::Custom, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()),
        ];
        for (terms, expected) in cases {
            assert_eq!(due_date_from_terms(issue, terms), expected);
        }
    }

    #[test]
    fn progress_rounds_completed_ratio() {
        assert_eq!(project_progress(3, 4), 75);
        assert_eq!(project_progress(0, 0), 0);
        assert_eq!(project_progress(0, 5), 0);
        assert_eq!(project_progress(5, 5), 100);
        assert_eq!(project_progress(1, 3), 33);
        assert_eq!(project_progress(2, 3), 67);
    }
}
