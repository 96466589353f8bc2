mod common;

use common::{date, Fixture, RULE_RECEIPT, RULE_RENT};
use rentroll_core::config::Config;
use rentroll_core::core::services::{BatchService, JournalPoster, LedgerWriter, MarkerService};
use rentroll_core::domain::{
    AccountKey, Assessment, Frequency, MarkerState, Receipt, ReceiptAllocation,
};
use rentroll_core::LedgerError;

fn seeded(fx: &Fixture) -> (rentroll_core::storage::LedgerStore, Assessment) {
    let store = fx.memory_store();
    let rent = Assessment::new(
        fx.business.id,
        fx.rentable.id,
        "Rent",
        1000.0,
        date(2015, 1, 1),
        date(2016, 1, 1),
        Frequency::Monthly,
        RULE_RENT,
    )
    .with_rental_agreement(fx.agreement.id);
    store
        .transact(|book| book.insert_assessment(rent.clone()))
        .unwrap();
    (store, rent)
}

#[test]
fn consecutive_runs_build_a_contiguous_chain() {
    let fx = Fixture::new();
    let ctx = fx.context();
    let (store, _) = seeded(&fx);
    let batch = BatchService::new(&store, &ctx);
    for month in 1..=3 {
        batch
            .run_period(date(2015, month, 1), date(2015, month + 1, 1))
            .unwrap();
    }

    let book = store.snapshot().unwrap();
    let ra = AccountKey::RentalAgreement(fx.agreement.id);
    let chain = book.markers(fx.business.id, &ra);
    let spans: Vec<_> = chain.iter().map(|m| (m.state, m.dt_start, m.dt_stop)).collect();
    assert_eq!(
        spans,
        vec![
            (MarkerState::Origin, date(2015, 1, 1), date(2015, 1, 1)),
            (MarkerState::Closed, date(2015, 1, 1), date(2015, 2, 1)),
            (MarkerState::Closed, date(2015, 2, 1), date(2015, 3, 1)),
            (MarkerState::Closed, date(2015, 3, 1), date(2015, 4, 1)),
        ]
    );
    for pair in chain.windows(2) {
        assert_eq!(pair[0].next, Some(pair[1].id));
        assert_eq!(pair[0].dt_stop, pair[1].dt_start);
    }
    assert_eq!(chain[3].balance, -3000.0);
    MarkerService::verify_chain(&book, fx.business.id, &ra, fx.config.epsilon).unwrap();
}

#[test]
fn writing_into_a_locked_period_is_refused_and_nothing_commits() {
    let fx = Fixture::new();
    let ctx = fx.context();
    let (store, rent) = seeded(&fx);
    BatchService::new(&store, &ctx)
        .run_period(date(2015, 1, 1), date(2015, 2, 1))
        .unwrap();
    let biz = fx.business.id;
    store
        .transact(|book| {
            for key in book.account_keys(biz) {
                MarkerService::lock_through(book, biz, &key, date(2015, 2, 1))?;
            }
            Ok(())
        })
        .unwrap();
    let before = store.snapshot().unwrap();

    let late = Receipt::new(biz, date(2015, 1, 20), 1000.0, RULE_RECEIPT)
        .with_rental_agreement(fx.agreement.id)
        .allocate(ReceiptAllocation::new(rent.id, 1000.0));
    let result = store.transact(|book| {
        book.insert_receipt(late.clone(), ctx.epsilon())?;
        let journal = JournalPoster::receipt_journal(book, &ctx, &late)?;
        let id = journal.id;
        book.insert_journal(journal, ctx.epsilon())?;
        LedgerWriter::write_journal(book, &ctx, id, true)
    });
    assert!(matches!(result, Err(LedgerError::Concurrency(_))));

    let after = store.snapshot().unwrap();
    assert_eq!(after.journal_count(), before.journal_count());
    assert_eq!(after.entry_count(), before.entry_count());
    assert!(after.receipt(late.id).is_none());
}

#[test]
fn closed_journal_period_skips_late_sources() {
    let fx = Fixture::new();
    let ctx = fx.context();
    let (store, rent) = seeded(&fx);
    let batch = BatchService::new(&store, &ctx);
    batch
        .run_period(date(2015, 1, 1), date(2015, 2, 1))
        .unwrap();

    let late = Receipt::new(fx.business.id, date(2015, 1, 20), 1000.0, RULE_RECEIPT)
        .with_rental_agreement(fx.agreement.id)
        .allocate(ReceiptAllocation::new(rent.id, 1000.0));
    store
        .transact(|book| book.insert_receipt(late.clone(), ctx.epsilon()))
        .unwrap();

    let report = batch
        .generate_journal_records(date(2015, 1, 1), date(2015, 2, 1))
        .unwrap();
    assert_eq!(report.succeeded(), 0);
    assert_eq!(report.failed(), 0);
    assert!(report.skipped() >= 1);
}

#[test]
fn reopen_and_close_rederives_the_balance() {
    let fx = Fixture::new();
    let ctx = fx.context();
    let (store, _) = seeded(&fx);
    BatchService::new(&store, &ctx)
        .run_period(date(2015, 1, 1), date(2015, 2, 1))
        .unwrap();
    let biz = fx.business.id;
    let key = AccountKey::gl("41000");

    let reopened = store
        .transact(|book| MarkerService::reopen(book, biz, &key))
        .unwrap();
    assert_eq!(reopened.state, MarkerState::Open);

    let closed = store
        .transact(|book| MarkerService::close_period(book, biz, &key, date(2015, 2, 1)))
        .unwrap()
        .unwrap();
    assert_eq!(closed.state, MarkerState::Closed);
    assert_eq!(closed.balance, -1000.0);
}

#[test]
fn keys_without_origin_fail_when_auto_origin_is_off() {
    let fx = Fixture::with_config(Config {
        auto_origin: false,
        ..Config::default()
    });
    let ctx = fx.context();
    let (store, _) = seeded(&fx);
    let report = BatchService::new(&store, &ctx)
        .run_period(date(2015, 1, 1), date(2015, 2, 1))
        .unwrap();
    assert_eq!(report.failed(), 3, "{:?}", report.outcomes);
    assert_eq!(store.snapshot().unwrap().marker_count(), 0);
}

#[test]
fn origin_after_existing_rows_is_rejected() {
    let fx = Fixture::new();
    let ctx = fx.context();
    let (store, _) = seeded(&fx);
    BatchService::new(&store, &ctx)
        .generate_journal_records(date(2015, 1, 1), date(2015, 2, 1))
        .unwrap();
    let biz = fx.business.id;
    store
        .transact(|book| {
            let ids: Vec<_> = book
                .journals_in(biz, date(2015, 1, 1), date(2015, 2, 1))
                .iter()
                .map(|j| j.id)
                .collect();
            for id in ids {
                LedgerWriter::write_journal(book, &ctx, id, false)?;
            }
            Ok(())
        })
        .unwrap();

    let err = store
        .transact(|book| {
            MarkerService::create_origin(book, biz, &AccountKey::gl("41000"), date(2015, 1, 15), 0.0)
        })
        .unwrap_err();
    assert!(matches!(err, LedgerError::Integrity(_)));
}
