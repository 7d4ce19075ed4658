//! End-to-end sale flows against both stores.

#[macro_use]
mod common;

use chrono::Local;
use ledger_core::{CoreError, PaymentMethod, SaleBuilder, SaleStatus, ValidationError};
use ledger_db::RecordStore;
use ledger_engine::{Ledger, LedgerError};

use common::{build, sell, stock_of, stock_product};

on_both_stores!(
    low_stock_after_two_sales,
    percent_discount_then_cancel,
    commit_then_cancel_restores_everything,
    cancelling_twice_fails_without_side_effects,
    builder_never_touches_stock,
    top_products_exclude_cancelled_sales,
    financial_summary_rolls_up_today,
    removed_product_between_add_and_commit,
    cancel_restores_removed_product,
    discount_beyond_subtotal_is_kept,
    oversized_quantities_are_rejected,
);

/// stock=10, min=2: sell 3 → 7 (fine), sell 6 → 1 (low).
async fn low_stock_after_two_sales<S: RecordStore>(ledger: Ledger<S>) {
    let product = stock_product(&ledger, "WATER", 200, 10, 2).await;

    sell(&ledger, &[("WATER", 3)], "", "1").await.unwrap();
    assert_eq!(stock_of(&ledger, product.id).await, 7);
    assert!(ledger.reports().low_stock().await.unwrap().is_empty());

    sell(&ledger, &[("WATER", 6)], "", "1").await.unwrap();
    assert_eq!(stock_of(&ledger, product.id).await, 1);

    let low = ledger.reports().low_stock().await.unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].code, "WATER");
}

/// subtotal 100.00 with "10%" → 10.00 off, 90.00 final; cancel removes it
/// from period revenue.
async fn percent_discount_then_cancel<S: RecordStore>(ledger: Ledger<S>) {
    let product = stock_product(&ledger, "RICE-5KG", 2500, 10, 0).await;

    let committed = sell(&ledger, &[("RICE-5KG", 4)], "10%", "3").await.unwrap();
    let sale = &committed.sale;
    assert_eq!(sale.subtotal_cents, 10000);
    assert_eq!(sale.discount_cents, 1000);
    assert_eq!(sale.final_total_cents, 9000);
    assert_eq!(sale.payment_method, PaymentMethod::CreditCard);
    assert_eq!(sale.status, SaleStatus::Finalized);

    let today = Local::now().date_naive();
    let period = ledger.reports().period(today, today).await.unwrap();
    assert_eq!(period.summary.sale_count, 1);
    assert_eq!(period.summary.revenue.cents(), 9000);

    let cancellation = ledger.sales().cancel(&sale.number).await.unwrap();
    assert_eq!(cancellation.sale.status, SaleStatus::Cancelled);
    assert_eq!(stock_of(&ledger, product.id).await, 10);

    let period = ledger.reports().period(today, today).await.unwrap();
    assert_eq!(period.summary.sale_count, 0);
    assert_eq!(period.summary.revenue.cents(), 0);
    assert_eq!(period.summary.average_ticket.cents(), 0);

    let day = ledger.sales().sales_of_day(today).await.unwrap();
    assert!(day.sales.is_empty());

    let stored = ledger.store().find_sale(&sale.number).await.unwrap().unwrap();
    assert_eq!(stored.status, SaleStatus::Cancelled);
    assert_eq!(stored.final_total_cents, 9000);
}

async fn commit_then_cancel_restores_everything<S: RecordStore>(ledger: Ledger<S>) {
    let a = stock_product(&ledger, "A", 125, 20, 0).await;
    let b = stock_product(&ledger, "B", 990, 8, 0).await;
    let c = stock_product(&ledger, "C", 45, 100, 0).await;

    let committed = sell(&ledger, &[("A", 3), ("B", 2), ("A", 4), ("C", 10)], "5", "5")
        .await
        .unwrap();

    let item_sum: i64 = committed.items.iter().map(|i| i.subtotal_cents).sum();
    assert_eq!(item_sum, committed.sale.subtotal_cents);
    assert_eq!(
        committed.sale.final_total_cents,
        committed.sale.subtotal_cents - committed.sale.discount_cents
    );
    assert_eq!(committed.sale.discount_cents, 500);
    assert_eq!(committed.items.len(), 4);
    assert!(committed.items.iter().all(|i| i.sale_id == committed.sale.id));

    assert_eq!(stock_of(&ledger, a.id).await, 13);
    assert_eq!(stock_of(&ledger, b.id).await, 6);
    assert_eq!(stock_of(&ledger, c.id).await, 90);

    let detail = ledger
        .sales()
        .sale_detail(&committed.sale.number)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detail.lines.len(), 4);
    assert_eq!(detail.lines[1].item.unit_price_cents, 990);

    let cancellation = ledger.sales().cancel(&committed.sale.number).await.unwrap();
    assert_eq!(cancellation.restored, 4);

    assert_eq!(stock_of(&ledger, a.id).await, 20);
    assert_eq!(stock_of(&ledger, b.id).await, 8);
    assert_eq!(stock_of(&ledger, c.id).await, 100);
}

async fn cancelling_twice_fails_without_side_effects<S: RecordStore>(ledger: Ledger<S>) {
    let product = stock_product(&ledger, "TEA", 300, 5, 0).await;
    let committed = sell(&ledger, &[("TEA", 2)], "", "2").await.unwrap();

    ledger.sales().cancel(&committed.sale.number).await.unwrap();
    assert_eq!(stock_of(&ledger, product.id).await, 5);

    let err = ledger.sales().cancel(&committed.sale.number).await.unwrap_err();
    assert!(matches!(err, LedgerError::Core(CoreError::SaleNotFound(_))));
    assert!(err.is_recoverable());
    assert_eq!(stock_of(&ledger, product.id).await, 5);
}

async fn builder_never_touches_stock<S: RecordStore>(ledger: Ledger<S>) {
    let product = stock_product(&ledger, "SOAP", 150, 10, 0).await;
    let desk = ledger.sales();
    let mut builder = SaleBuilder::new();

    let err = desk.add_item(&mut builder, "SOAP", 11).await.unwrap_err();
    assert_eq!(
        err.as_core(),
        Some(&CoreError::InsufficientStock {
            code: "SOAP".into(),
            available: 10,
            requested: 11,
        })
    );

    desk.add_item(&mut builder, "SOAP", 6).await.unwrap();
    let err = desk.add_item(&mut builder, "SOAP", 6).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Core(CoreError::InsufficientStock { available: 4, requested: 6, .. })
    ));

    let err = desk.add_item(&mut builder, "SOAP", 0).await.unwrap_err();
    assert_eq!(err.as_core(), Some(&CoreError::InvalidQuantity(0)));

    assert_eq!(builder.len(), 1);
    assert_eq!(stock_of(&ledger, product.id).await, 10);
    drop(builder);

    let err = desk
        .complete(SaleBuilder::new(), "", "1", None)
        .await
        .unwrap_err();
    assert_eq!(err.as_core(), Some(&CoreError::EmptySale));
    assert!(ledger.store().select_sales().await.unwrap().is_empty());
}

async fn top_products_exclude_cancelled_sales<S: RecordStore>(ledger: Ledger<S>) {
    stock_product(&ledger, "BREAD", 500, 50, 0).await;
    stock_product(&ledger, "APPLE", 100, 50, 0).await;
    stock_product(&ledger, "MILK", 400, 50, 0).await;

    sell(&ledger, &[("BREAD", 5), ("APPLE", 2)], "", "1").await.unwrap();
    sell(&ledger, &[("APPLE", 3), ("MILK", 2)], "", "1").await.unwrap();
    let cancelled = sell(&ledger, &[("MILK", 20)], "", "1").await.unwrap();
    ledger.sales().cancel(&cancelled.sale.number).await.unwrap();

    let top = ledger.reports().top_products().await.unwrap();
    let codes: Vec<&str> = top.iter().filter_map(|t| t.code.as_deref()).collect();
    // APPLE and BREAD tie at 5 units
    assert_eq!(codes, vec!["APPLE", "BREAD", "MILK"]);
    assert_eq!(top[0].revenue.cents(), 500);
    assert_eq!(top[0].average_price.cents(), 100);
    assert_eq!(top[2].quantity_sold, 2);

    let top = ledger.reports().top_products_limited(1).await.unwrap();
    assert_eq!(top.len(), 1);
}

async fn financial_summary_rolls_up_today<S: RecordStore>(ledger: Ledger<S>) {
    stock_product(&ledger, "JAM", 1000, 10, 3).await;
    stock_product(&ledger, "OIL", 1500, 10, 9).await;

    sell(&ledger, &[("JAM", 1)], "", "1").await.unwrap();
    sell(&ledger, &[("OIL", 2)], "", "4").await.unwrap();
    let cancelled = sell(&ledger, &[("JAM", 2)], "", "2").await.unwrap();
    ledger.sales().cancel(&cancelled.sale.number).await.unwrap();

    let summary = ledger.reports().financial_summary().await.unwrap();
    assert_eq!(summary.today.sale_count, 2);
    assert_eq!(summary.today.revenue.cents(), 4000);
    assert_eq!(summary.today.average_ticket.cents(), 2000);
    assert_eq!(summary.month.sale_count, 2);

    let methods: Vec<PaymentMethod> = summary.payment_breakdown.iter().map(|s| s.method).collect();
    assert_eq!(methods, vec![PaymentMethod::Pix, PaymentMethod::Cash]);

    // OIL: 8 <= 9
    assert_eq!(summary.low_stock_count, 1);
}

async fn removed_product_between_add_and_commit<S: RecordStore>(ledger: Ledger<S>) {
    let product = stock_product(&ledger, "EGGS", 600, 12, 0).await;
    let builder = build(&ledger, &[("EGGS", 2)]).await;

    ledger.catalog().remove("EGGS").await.unwrap();

    let err = ledger
        .sales()
        .complete(builder, "", "1", None)
        .await
        .unwrap_err();
    assert_eq!(err.as_core(), Some(&CoreError::ProductNotFound("EGGS".into())));
    assert_eq!(stock_of(&ledger, product.id).await, 12);
    assert!(ledger.store().select_sales().await.unwrap().is_empty());
    assert!(ledger.store().select_sale_items().await.unwrap().is_empty());
}

async fn cancel_restores_removed_product<S: RecordStore>(ledger: Ledger<S>) {
    let product = stock_product(&ledger, "FLOUR", 450, 10, 0).await;
    let committed = sell(&ledger, &[("FLOUR", 4)], "", "1").await.unwrap();

    ledger.catalog().remove("FLOUR").await.unwrap();
    let cancellation = ledger.sales().cancel(&committed.sale.number).await.unwrap();

    assert_eq!(cancellation.restored, 1);
    assert_eq!(stock_of(&ledger, product.id).await, 10);
    assert!(ledger.catalog().list_active().await.unwrap().is_empty());
}

async fn discount_beyond_subtotal_is_kept<S: RecordStore>(ledger: Ledger<S>) {
    stock_product(&ledger, "GUM", 500, 10, 0).await;

    let committed = sell(&ledger, &[("GUM", 1)], "10", "9").await.unwrap();
    assert_eq!(committed.sale.final_total_cents, -500);
    assert!(committed.sale.has_negative_total());
    assert_eq!(committed.sale.payment_method, PaymentMethod::Unspecified);

    let malformed = sell(&ledger, &[("GUM", 1)], "ten", "1").await.unwrap();
    assert_eq!(malformed.sale.discount_cents, 0);
    assert_eq!(malformed.sale.final_total_cents, 500);
}

/// Amounts that do not fit in an i64 are refused, never wrapped.
async fn oversized_quantities_are_rejected<S: RecordStore>(ledger: Ledger<S>) {
    const HUGE: i64 = 10_000_000_000_000;
    let product = stock_product(&ledger, "BULK", 1_000_000, HUGE, 0).await;

    let mut builder = SaleBuilder::new();
    let err = ledger
        .sales()
        .add_item(&mut builder, "BULK", HUGE)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Core(CoreError::Validation(ValidationError::OutOfRange { .. }))
    ));
    assert!(err.is_recoverable());
    assert!(builder.is_empty());

    let err = ledger.catalog().receive_stock("BULK", i64::MAX).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Core(CoreError::Validation(ValidationError::OutOfRange { .. }))
    ));
    assert_eq!(stock_of(&ledger, product.id).await, HUGE);
    assert!(ledger.store().select_sales().await.unwrap().is_empty());
}
