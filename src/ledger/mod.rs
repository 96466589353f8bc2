pub mod posting_rule;
pub mod proration;
pub mod recurrence;
pub mod time_interval;

pub use posting_rule::{AccountRef, AccountResolver, PostingLeg, PostingRule, RuleTerm, Share, Side};
pub use proration::prorate;
pub use recurrence::{expand, occurrence_dates, Occurrence};
pub use time_interval::{TimeInterval, TimeUnit};
