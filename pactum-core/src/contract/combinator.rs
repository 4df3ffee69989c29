//! Short-circuiting conjunction over lazily produced verdicts

use tracing::trace;

use super::condition::Verdict;

/// Resolve `checks` one after another and report whether all of them hold.
///
/// Items are pulled from the iterator only when the previous one resolved to
/// `true`, so infinite iterators are fine as long as one of them fails and
/// later items may rely on earlier ones holding. The first error is returned
/// as-is.
pub async fn awaited_all<'a, I>(checks: I) -> anyhow::Result<bool>
where
    I: IntoIterator,
    I::Item: Into<Verdict<'a>>,
{
    for (index, check) in checks.into_iter().enumerate() {
        if !Into::<Verdict<'a>>::into(check).resolve().await? {
            trace!(index, "short-circuited on a failing check");
            return Ok(false);
        }
    }

    Ok(true)
}

/// Like [`awaited_all`] but without suspending.
///
/// Returns `None` as soon as a pending verdict is met.
pub fn all_now<'a, I>(checks: I) -> Option<anyhow::Result<bool>>
where
    I: IntoIterator,
    I::Item: Into<Verdict<'a>>,
{
    for (index, check) in checks.into_iter().enumerate() {
        match Into::<Verdict<'a>>::into(check).now()? {
            Ok(true) => continue,
            Ok(false) => {
                trace!(index, "short-circuited on a failing check");
                return Some(Ok(false));
            }
            Err(err) => return Some(Err(err)),
        }
    }

    Some(Ok(true))
}
