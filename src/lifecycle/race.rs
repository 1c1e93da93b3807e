//! First-of-N completion.
//!
//! Used both to collapse several termination signals into one stop and to
//! race a drain against its countdown.

use futures_util::future::{select_all, BoxFuture};

/// Wait for the first of `contenders` to complete.
///
/// Returns its output and position. Contenders are polled in order on every
/// wake, so when several are ready at once the earliest entry wins. The
/// losers are dropped before this returns, which releases whatever they
/// hold (timers, signal subscriptions). An empty race does not compile.
pub async fn first_of<'a, T, const N: usize>(contenders: [BoxFuture<'a, T>; N]) -> (T, usize) {
    const { assert!(N > 0, "first_of needs at least one contender") };

    let (output, index, losers) = select_all(contenders).await;
    drop(losers);
    (output, index)
}
