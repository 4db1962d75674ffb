//! Selector-driven replacement of live elements with fetched ones.

use crate::document::{compile_selector, FetchedSection, LivePage};
use crate::types::{PatchReport, SelectorOutcome};

/// Replace live elements with their fetched counterparts, one selector at a
/// time, in list order.
///
/// Each selector is independent: a miss or an invalid selector is recorded
/// in the report and the next selector is still processed.
pub fn patch_elements<S: AsRef<str>>(
    page: &mut LivePage,
    fetched: &mut FetchedSection,
    selectors: &[S],
) -> PatchReport {
    let mut report = PatchReport::default();

    for raw in selectors {
        let raw = raw.as_ref();
        let outcome = match compile_selector(raw) {
            Ok(selector) => page.replace(&selector, fetched),
            Err(e) => SelectorOutcome::InvalidSelector(e.to_string()),
        };

        match &outcome {
            SelectorOutcome::Replaced => tracing::debug!("Replaced element '{raw}'"),
            SelectorOutcome::InvalidSelector(reason) => {
                tracing::debug!("Skipping selector: {reason}")
            }
            _ => {}
        }

        report.push(raw, outcome);
    }

    report
}
