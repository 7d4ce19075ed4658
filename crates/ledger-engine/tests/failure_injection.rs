//! Store failures at every write stage leave the store untouched.

mod common;

use ledger_core::SaleStatus;
use ledger_db::{DbError, RecordStore};
use ledger_engine::{CommitStage, LedgerError};

use common::{build, faulty_ledger, snapshot, stock_of, stock_product, Fault};

#[tokio::test]
async fn test_commit_failures_roll_back_every_stage() {
    let cases = [
        Fault::InsertItem(0),
        Fault::ApplyStock(0),
        Fault::InsertItem(1),
        Fault::ApplyStock(1),
        Fault::Commit,
    ];

    for fault in cases {
        let (ledger, store) = faulty_ledger();
        let a = stock_product(&ledger, "A", 100, 10, 0).await;
        let b = stock_product(&ledger, "B", 250, 10, 0).await;
        let builder = build(&ledger, &[("A", 2), ("B", 3)]).await;

        let before = snapshot(store.as_ref()).await;
        store.fail_at(fault);

        let err = ledger
            .sales()
            .complete(builder, "", "1", None)
            .await
            .unwrap_err();

        let LedgerError::PartialCommitFailure {
            stage, rolled_back, ..
        } = err
        else {
            panic!("{fault:?}: expected PartialCommitFailure");
        };
        assert!(rolled_back, "{fault:?}");

        let expected_stage = match fault {
            Fault::InsertItem(index) => CommitStage::LineItem {
                index,
                product_id: [a.id, b.id][index],
            },
            Fault::ApplyStock(index) => CommitStage::StockDecrement {
                index,
                product_id: [a.id, b.id][index],
            },
            _ => CommitStage::Finalize,
        };
        assert_eq!(stage, expected_stage);

        assert_eq!(snapshot(store.as_ref()).await, before, "{fault:?}");
        assert_eq!(stock_of(&ledger, a.id).await, 10);
        assert_eq!(stock_of(&ledger, b.id).await, 10);
    }
}

#[tokio::test]
async fn test_rejected_header_writes_nothing() {
    let (ledger, store) = faulty_ledger();
    let product = stock_product(&ledger, "A", 100, 10, 0).await;
    let builder = build(&ledger, &[("A", 1)]).await;

    let before = snapshot(store.as_ref()).await;
    store.fail_at(Fault::InsertSale);

    let err = ledger
        .sales()
        .complete(builder, "", "1", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::SaleWriteFailed {
            source: DbError::QueryFailed(_)
        }
    ));
    assert!(!err.is_recoverable());
    assert_eq!(snapshot(store.as_ref()).await, before);
    assert_eq!(stock_of(&ledger, product.id).await, 10);
}

#[tokio::test]
async fn test_failed_rollback_is_reported() {
    let (ledger, store) = faulty_ledger();
    stock_product(&ledger, "A", 100, 10, 0).await;
    let builder = build(&ledger, &[("A", 1)]).await;

    store.fail_at(Fault::ApplyStock(0));
    store.fail_rollback(true);

    let err = ledger
        .sales()
        .complete(builder, "", "1", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::PartialCommitFailure {
            rolled_back: false,
            stage: CommitStage::StockDecrement { index: 0, .. },
            ..
        }
    ));
}

#[tokio::test]
async fn test_cancel_failures_roll_back_every_stage() {
    let cases = [
        (Fault::Transition, CommitStage::StatusFlip),
        (Fault::SaleItems, CommitStage::ItemLookup),
        (Fault::ApplyStock(1), CommitStage::StockRestore { product_id: 0 }),
        (Fault::Commit, CommitStage::Finalize),
    ];

    for (fault, expected_stage) in cases {
        let (ledger, store) = faulty_ledger();
        let a = stock_product(&ledger, "A", 100, 10, 0).await;
        let b = stock_product(&ledger, "B", 250, 10, 0).await;
        let builder = build(&ledger, &[("A", 2), ("B", 3)]).await;
        let committed = ledger
            .sales()
            .complete(builder, "", "1", None)
            .await
            .unwrap();
        let number = committed.sale.number.clone();

        let before = snapshot(store.as_ref()).await;
        store.fail_at(fault);

        let err = ledger.sales().cancel(&number).await.unwrap_err();
        let LedgerError::PartialCommitFailure {
            stage,
            rolled_back,
            sale_number,
            ..
        } = err
        else {
            panic!("{fault:?}: expected PartialCommitFailure");
        };
        assert!(rolled_back);
        assert_eq!(sale_number, number);
        match expected_stage {
            CommitStage::StockRestore { .. } => {
                assert_eq!(stage, CommitStage::StockRestore { product_id: b.id })
            }
            other => assert_eq!(stage, other),
        }

        assert_eq!(snapshot(store.as_ref()).await, before, "{fault:?}");
        let sale = store.find_sale(&number).await.unwrap().unwrap();
        assert_eq!(sale.status, SaleStatus::Finalized);

        // The sale is still cancellable once the store recovers
        store.heal();
        ledger.sales().cancel(&number).await.unwrap();
        assert_eq!(stock_of(&ledger, a.id).await, 10);
        assert_eq!(stock_of(&ledger, b.id).await, 10);
    }
}

#[tokio::test]
async fn test_unreachable_store_is_unavailable() {
    let (ledger, store) = faulty_ledger();
    stock_product(&ledger, "A", 100, 10, 0).await;
    store.fail_at(Fault::ApplyStock(0));

    let err = ledger.catalog().receive_stock("A", 5).await.unwrap_err();
    assert!(matches!(err, LedgerError::StoreUnavailable(DbError::QueryFailed(_))));
    assert!(!err.is_recoverable());
    assert_eq!(ledger.catalog().find_by_code("A").await.unwrap().stock_quantity, 10);
}
