use std::sync::Arc;

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rentroll_core::config::Config;
use rentroll_core::core::services::{BalanceService, BatchService};
use rentroll_core::core::{BusinessContext, StaticMasterData};
use rentroll_core::domain::{
    AccountKey, Assessment, Business, Frequency, GlAccount, Rentable, RentalAgreement,
};
use rentroll_core::storage::{Book, LedgerStore};
use uuid::Uuid;

const UNITS: usize = 200;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// A business with `UNITS` tenants on daily rent, posted and checkpointed month by
/// month for a year.
fn build_history() -> (Arc<Book>, Uuid, AccountKey, AccountKey) {
    let business = Business::new("BEN", "Benchmark Holdings");
    let mut master = StaticMasterData::new()
        .with_business(business.clone())
        .with_account(GlAccount::new(business.id, "11000", "Rent Receivable"))
        .with_account(GlAccount::new(business.id, "41000", "Gross Scheduled Rent"));
    let mut assessments = Vec::with_capacity(UNITS);
    let mut first_agreement = None;
    for idx in 0..UNITS {
        let rentable = Rentable::new(business.id, format!("Unit {}", idx));
        let agreement = RentalAgreement::new(business.id, date(2015, 1, 1), date(2016, 1, 1))
            .with_rentable(rentable.id);
        first_agreement.get_or_insert(agreement.id);
        assessments.push(
            Assessment::new(
                business.id,
                rentable.id,
                "Rent",
                40.0 + idx as f64,
                date(2015, 1, 1),
                date(2016, 1, 1),
                Frequency::Daily,
                "d 11000 _, c 41000 _",
            )
            .with_rental_agreement(agreement.id),
        );
        master = master.with_rentable(rentable).with_rental_agreement(agreement);
    }

    let config = Config::default();
    let ctx = BusinessContext::load(Arc::new(master), business.id, &config).expect("context");
    let store = LedgerStore::in_memory(config.epsilon);
    store
        .transact(|book| {
            for asmt in assessments {
                book.insert_assessment(asmt)?;
            }
            Ok(())
        })
        .expect("seed assessments");
    let batch = BatchService::new(&store, &ctx);
    for month in 1..=12 {
        let end = if month == 12 {
            date(2016, 1, 1)
        } else {
            date(2015, month + 1, 1)
        };
        batch
            .run_period(date(2015, month, 1), end)
            .expect("run period");
    }
    let ra = AccountKey::RentalAgreement(first_agreement.expect("at least one unit"));
    (
        store.snapshot().expect("snapshot"),
        business.id,
        AccountKey::gl("41000"),
        ra,
    )
}

fn bench_queries(c: &mut Criterion) {
    let (book, business, rent, ra) = build_history();

    c.bench_function("balance_mid_period", |b| {
        b.iter(|| {
            BalanceService::balance(&book, business, &rent, black_box(date(2015, 7, 17)), 31)
                .expect("balance")
        })
    });

    c.bench_function("statement_one_month", |b| {
        b.iter(|| {
            BalanceService::statement(
                &book,
                business,
                &ra,
                black_box(date(2015, 6, 1)),
                black_box(date(2015, 7, 1)),
                31,
            )
            .expect("statement")
        })
    });

    c.bench_function("book_verify", |b| {
        b.iter(|| book.verify(black_box(0.005)).expect("verify"))
    });
}

criterion_group!(benches, bench_queries);
criterion_main!(benches);
