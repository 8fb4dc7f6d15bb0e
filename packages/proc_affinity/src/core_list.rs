//! Parsing and emitting of lists of logical core IDs in the `cpulist` notation used by Linux
//! utilities such as `taskset -c` and by files under `/sys/devices/system/cpu`.
//!
//! Example: `0-9,32-35,40`
//!
//! The value is a comma-separated list of zero or more items, where each item is either:
//!
//! * a single core ID (e.g. `1`)
//! * an inclusive range of core IDs (e.g. `2-4`)
//! * an inclusive range with a stride (e.g. `5-9:2`, which is equivalent to `5,7,9`)
//!
//! Whitespace is not allowed inside the list. Core IDs are non-negative; something like `-1` is
//! rejected rather than being misread as a range.

use itertools::Itertools;

use crate::{Error, LogicalCoreId, Result};

/// Largest number of core IDs a single range may expand to.
///
/// Far above what any affinity mask can address, low enough that typos such as
/// `0-4294967295` are rejected instead of being expanded.
pub const MAX_RANGE_LEN: u32 = 65_536;

/// Parses a core list and returns the core IDs in ascending order, without duplicates.
///
/// An empty string is valid input and returns an empty result. Callers that need a non-empty
/// set (such as [`AffinityMask`][crate::AffinityMask]) validate that separately.
///
/// # Example
///
/// ```
/// let cores = proc_affinity::core_list::parse("0-3,8,10-14:2").unwrap();
/// assert_eq!(cores, vec![0, 1, 2, 3, 8, 10, 12, 14]);
/// ```
pub fn parse(core_list: &str) -> Result<Vec<LogicalCoreId>> {
    let item_ranges = core_list
        .split(',')
        .map(parse_part)
        .collect::<Result<Vec<_>>>()?;

    Ok(item_ranges.into_iter().flatten().sorted().dedup().collect())
}

/// Emits core IDs in the compact core list notation, collapsing consecutive IDs into ranges.
///
/// The input does not need to be sorted or deduplicated.
///
/// # Example
///
/// ```
/// let text = proc_affinity::core_list::emit([5, 0, 1, 2, 3, 7, 6]);
/// assert_eq!(text, "0-3,5-7");
/// ```
pub fn emit(cores: impl IntoIterator<Item = LogicalCoreId>) -> String {
    cores
        .into_iter()
        .sorted()
        .dedup()
        .fold(Vec::<(LogicalCoreId, LogicalCoreId)>::new(), |mut runs, core| {
            match runs.last_mut() {
                Some((_, end)) if end.checked_add(1) == Some(core) => *end = core,
                _ => runs.push((core, core)),
            }
            runs
        })
        .into_iter()
        .map(|(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .join(",")
}

fn parse_part(part: &str) -> Result<Vec<LogicalCoreId>> {
    if part.is_empty() {
        return Ok(vec![]);
    }

    if part.starts_with('-') {
        return Err(Error::invalid_argument(
            part,
            "core ids must be non-negative integers",
        ));
    }

    match part.split_once('-') {
        Some((start, end_and_stride)) => parse_range(start, end_and_stride),
        None => parse_id(part, "item").map(|core| vec![core]),
    }
}

fn parse_range(start: &str, end_and_stride: &str) -> Result<Vec<LogicalCoreId>> {
    let start = parse_id(start, "range start")?;

    // A range without an explicit stride has a stride of 1.
    let (end, stride) = match end_and_stride.split_once(':') {
        Some((end, stride)) => (parse_id(end, "range end")?, parse_id(stride, "range stride")?),
        None => (parse_id(end_and_stride, "range end")?, 1),
    };

    if stride == 0 {
        return Err(Error::invalid_argument(
            format!("{start}-{end}:{stride}"),
            "range stride must not be zero",
        ));
    }

    if start > end {
        return Err(Error::invalid_argument(
            format!("{start}-{end}"),
            "range start must be <= end",
        ));
    }

    // Number of elements after the first one.
    let steps = end.abs_diff(start).checked_div(stride).unwrap_or_default();

    if steps >= MAX_RANGE_LEN {
        return Err(Error::invalid_argument(
            format!("{start}-{end}:{stride}"),
            format!("range must not expand to more than {MAX_RANGE_LEN} core ids"),
        ));
    }

    let stride = usize::try_from(stride).map_err(|error| {
        Error::invalid_argument(stride.to_string(), format!("range stride is too large ({error})"))
    })?;

    Ok((start..=end).step_by(stride).collect())
}

fn parse_id(text: &str, what: &str) -> Result<LogicalCoreId> {
    text.parse::<LogicalCoreId>().map_err(|error| {
        Error::invalid_argument(
            text,
            format!("{what} could not be parsed as a non-negative integer ({error})"),
        )
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn parse_smoke_test() {
        assert_eq!(parse("").unwrap(), Vec::<LogicalCoreId>::new());
        assert_eq!(parse("555").unwrap(), vec![555]);
        assert_eq!(parse("0,1,2,3").unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(parse("2,3,1").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse("0-5,1-6").unwrap(), vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(parse("0-0:5").unwrap(), vec![0]);
        assert_eq!(
            parse("0-10:3,5-15:3").unwrap(),
            vec![0, 3, 5, 6, 8, 9, 11, 14]
        );
        assert_eq!(parse("0-10:999999").unwrap(), vec![0]);
    }

    #[test]
    fn malformed_lists_are_invalid_arguments() {
        for text in [
            "foo", "1-22:0", "2-1", "123-foo", "foo-123", "123-456:foo", "-1", "0,-3", "1.5",
            " 1", "0-4294967295", "0-65536", "1-131073:2",
        ] {
            let error = parse(text).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::InvalidArgument, "{text:?}");
        }
    }

    #[test]
    fn largest_ranges_are_accepted() {
        assert_eq!(parse("0-65535").unwrap().len(), 65_536);
        assert_eq!(parse("0-4294967295:65537").unwrap().len(), 65_536);
    }

    #[test]
    fn emit_collapses_runs() {
        assert_eq!(emit([]), "");
        assert_eq!(emit([4]), "4");
        assert_eq!(emit([0, 1, 2, 3]), "0-3");
        assert_eq!(emit([0, 2, 4]), "0,2,4");
        assert_eq!(emit([9, 8, 1, 0, 8]), "0-1,8-9");
        assert_eq!(emit([LogicalCoreId::MAX, 0]), format!("0,{}", LogicalCoreId::MAX));
    }

    #[test]
    fn emitted_text_parses_back() {
        let cores = vec![0, 1, 2, 5, 7, 8, 9, 63];
        assert_eq!(parse(&emit(cores.iter().copied())).unwrap(), cores);
    }
}
