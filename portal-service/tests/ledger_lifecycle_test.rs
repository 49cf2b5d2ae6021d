//! Invoice lifecycle arithmetic, exercised through the public ledger API the
//! way the database layer drives it: item amounts, totals recomputation on
//! every mutation, then payments transitioning the status.

use chrono::NaiveDate;
use portal_service::ledger;
use portal_service::models::{InvoiceStatus, PaymentTerms};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[test]
fn invoice_lifecycle_from_draft_to_paid() {
    // Draft created with 9.5% tax and no discount.
    let tax_rate = dec!(9.5);
    let discount = Decimal::ZERO;

    // First item added.
    let design = ledger::line_amount(dec!(12), dec!(120));
    let totals = ledger::recalculate_totals(&[design], discount, tax_rate, Decimal::ZERO);
    assert_eq!(totals.subtotal, dec!(1440.00));
    assert_eq!(totals.total, dec!(1576.80));

    // Second item added; totals rederived from all amounts.
    let hosting = ledger::line_amount(dec!(3), dec!(25.50));
    let amounts = [design, hosting];
    let totals = ledger::recalculate_totals(&amounts, discount, tax_rate, Decimal::ZERO);
    assert_eq!(totals.subtotal, dec!(1516.50));
    assert_eq!(totals.tax_amount, dec!(144.07));
    assert_eq!(totals.total, dec!(1660.57));
    assert_eq!(totals.amount_due, totals.total);

    // Partial payment.
    let first_payment_date = NaiveDate::from_ymd_opt(2026, 2, 10).expect("valid date");
    let outcome = ledger::apply_payment(
        totals.total,
        Decimal::ZERO,
        InvoiceStatus::Sent,
        None,
        dec!(800),
        first_payment_date,
    );
    assert_eq!(outcome.status, InvoiceStatus::PartiallyPaid);
    assert_eq!(outcome.amount_paid, dec!(800));
    assert_eq!(outcome.amount_due, dec!(860.57));
    assert_eq!(outcome.paid_date, None);

    // Remaining balance settles the invoice.
    let second_payment_date = NaiveDate::from_ymd_opt(2026, 2, 24).expect("valid date");
    let outcome = ledger::apply_payment(
        totals.total,
        outcome.amount_paid,
        outcome.status,
        outcome.paid_date,
        dec!(860.57),
        second_payment_date,
    );
    assert_eq!(outcome.status, InvoiceStatus::Paid);
    assert_eq!(outcome.amount_due, Decimal::ZERO.round_dp(2));
    assert_eq!(outcome.paid_date, Some(second_payment_date));
}

#[test]
fn removing_an_item_rolls_totals_back() {
    let tax_rate = dec!(10);
    let amounts = [dec!(200.00), dec!(300.00)];
    let with_both = ledger::recalculate_totals(&amounts, Decimal::ZERO, tax_rate, Decimal::ZERO);
    assert_eq!(with_both.total, dec!(550.00));

    let with_one =
        ledger::recalculate_totals(&amounts[..1], Decimal::ZERO, tax_rate, Decimal::ZERO);
    assert_eq!(with_one.total, dec!(220.00));
}

#[test]
fn rate_change_keeps_amount_paid_and_rederives_due() {
    let amounts = [dec!(1000.00)];
    let paid = dec!(250);

    let before = ledger::recalculate_totals(&amounts, Decimal::ZERO, dec!(5), paid);
    assert_eq!(before.total, dec!(1050.00));
    assert_eq!(before.amount_due, dec!(800.00));

    let after = ledger::recalculate_totals(&amounts, dec!(10), dec!(5), paid);
    assert_eq!(after.discount_amount, dec!(100.00));
    assert_eq!(after.total, dec!(945.00));
    assert_eq!(after.amount_due, dec!(695.00));
}

#[test]
fn invoice_numbers_restart_each_year() {
    assert_eq!(ledger::next_invoice_number(41, 2025), "INV-2025-0042");
    assert_eq!(ledger::next_invoice_number(0, 2026), "INV-2026-0001");
}

#[test]
fn default_due_date_comes_from_payment_terms() {
    let issue = NaiveDate::from_ymd_opt(2026, 6, 15).expect("valid date");
    assert_eq!(
        ledger::due_date_from_terms(issue, PaymentTerms::Net30),
        NaiveDate::from_ymd_opt(2026, 7, 15).expect("valid date"),
    );
    assert_eq!(ledger::due_date_from_terms(issue, PaymentTerms::DueOnReceipt), issue);
}
