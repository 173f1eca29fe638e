//! Weekly availability: the `schedule_blocks` stored on a profile.
//!
//! Blocks are written one per line as `Mon 9:00-10:30 CS101`; the label is optional.

use chrono::NaiveTime;
use regex::Regex;
use std::sync::OnceLock;

use crate::models::ScheduleBlock;

pub const DAYS_OF_WEEK: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Availability assumed outside of blocks.
const DAY_START: (u32, u32) = (6, 0);
const DAY_END: (u32, u32) = (23, 0);

fn block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\S+)\s+(\d{1,2}(?::\d{2})?)\s*-\s*(\d{1,2}(?::\d{2})?)(?:\s+(.+))?$")
            .expect("schedule pattern is valid")
    })
}

/// Parse `H`, `H:MM` or `HH:MM`.
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    let (hour, minute) = match text.split_once(':') {
        Some((h, m)) => (h.parse().ok()?, m.parse().ok()?),
        None => (text.parse().ok()?, 0),
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// `"monday"` / `"MON"` -> `"Mon"`; None for anything that is not a weekday.
pub fn normalize_day(text: &str) -> Option<&'static str> {
    let prefix: String = text.chars().take(3).collect::<String>().to_lowercase();
    DAYS_OF_WEEK
        .iter()
        .find(|day| day.to_lowercase() == prefix)
        .copied()
}

/// Parse a multi-line schedule. Lines that do not describe a block are skipped.
pub fn parse_schedule(text: &str) -> Vec<ScheduleBlock> {
    text.lines()
        .filter_map(|line| parse_block(line.trim()))
        .collect()
}

fn parse_block(line: &str) -> Option<ScheduleBlock> {
    let caps = block_pattern().captures(line)?;
    let day = normalize_day(&caps[1])?;
    let start = caps[2].to_string();
    let end = caps[3].to_string();
    parse_time(&start)?;
    parse_time(&end)?;

    Some(ScheduleBlock {
        day: day.to_string(),
        start_time: start,
        end_time: end,
        label: caps.get(4).map(|m| m.as_str().trim().to_string()),
    })
}

/// True when a shift on `day` from `start` to `end` overlaps one of the blocks.
/// Shift times that cannot be parsed are treated as no conflict.
pub fn has_conflict(blocks: &[ScheduleBlock], day: &str, start: &str, end: &str) -> bool {
    let (Some(day), Some(start), Some(end)) = (normalize_day(day), parse_time(start), parse_time(end))
    else {
        return false;
    };

    blocks.iter().filter(|b| b.day == day).any(|block| {
        match (parse_time(&block.start_time), parse_time(&block.end_time)) {
            (Some(block_start), Some(block_end)) => start < block_end && end > block_start,
            _ => false,
        }
    })
}

/// Free windows on `day` between 06:00 and 23:00, formatted `HH:MM`.
pub fn available_windows(blocks: &[ScheduleBlock], day: &str) -> Vec<(String, String)> {
    let (Some(day), Some(day_start), Some(day_end)) = (
        normalize_day(day),
        NaiveTime::from_hms_opt(DAY_START.0, DAY_START.1, 0),
        NaiveTime::from_hms_opt(DAY_END.0, DAY_END.1, 0),
    ) else {
        return Vec::new();
    };

    let mut busy: Vec<(NaiveTime, NaiveTime)> = blocks
        .iter()
        .filter(|b| b.day == day)
        .filter_map(|b| Some((parse_time(&b.start_time)?, parse_time(&b.end_time)?)))
        .collect();
    busy.sort();

    let fmt = |t: NaiveTime| t.format("%H:%M").to_string();

    let mut windows = Vec::new();
    let mut cursor = day_start;
    for (start, end) in busy {
        if cursor < start {
            windows.push((fmt(cursor), fmt(start.min(day_end))));
        }
        cursor = cursor.max(end);
    }
    if cursor < day_end {
        windows.push((fmt(cursor), fmt(day_end)));
    }
    windows
}

/// Human-readable availability: free days, then busy times per day.
pub fn availability_summary(blocks: &[ScheduleBlock]) -> String {
    if blocks.is_empty() {
        return "Fully available".to_string();
    }

    let mut parts = Vec::new();
    let free: Vec<&str> = DAYS_OF_WEEK
        .iter()
        .copied()
        .filter(|day| !blocks.iter().any(|b| b.day == *day))
        .collect();
    if !free.is_empty() {
        parts.push(format!("Free: {}", free.join(", ")));
    }

    for day in DAYS_OF_WEEK {
        let times: Vec<String> = blocks
            .iter()
            .filter(|b| b.day == day)
            .map(|b| format!("{}-{}", b.start_time, b.end_time))
            .collect();
        if !times.is_empty() {
            parts.push(format!("{} busy: {}", day, times.join(", ")));
        }
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(day: &str, start: &str, end: &str) -> ScheduleBlock {
        ScheduleBlock {
            day: day.into(),
            start_time: start.into(),
            end_time: end.into(),
            label: None,
        }
    }

    #[test]
    fn test_parse_schedule() {
        let blocks = parse_schedule(
            "Mon 9:00-10:30 CS101\n\
             tuesday 14:00-15:30 Math 202\n\
             \n\
             Funday 9:00-10:00\n\
             Wed 9-10\n\
             Thu 25:00-26:00\n\
             garbage",
        );
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].day, "Mon");
        assert_eq!(blocks[0].label.as_deref(), Some("CS101"));
        assert_eq!(blocks[1].day, "Tue");
        assert_eq!(blocks[1].label.as_deref(), Some("Math 202"));
        assert_eq!(blocks[2].day, "Wed");
        assert_eq!(blocks[2].start_time, "9");
        assert_eq!(blocks[2].label, None);
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("9:05"), NaiveTime::from_hms_opt(9, 5, 0));
        assert_eq!(parse_time("14"), NaiveTime::from_hms_opt(14, 0, 0));
        assert_eq!(parse_time("24:00"), None);
        assert_eq!(parse_time("noon"), None);
    }

    #[test]
    fn test_conflicts() {
        let blocks = vec![block("Mon", "9:00", "10:30"), block("Wed", "13:00", "14:00")];
        assert!(has_conflict(&blocks, "Monday", "10:00", "12:00"));
        assert!(!has_conflict(&blocks, "Mon", "10:30", "12:00"));
        assert!(!has_conflict(&blocks, "Tue", "9:00", "10:00"));
        assert!(has_conflict(&blocks, "wed", "12:00", "13:30"));
        assert!(!has_conflict(&blocks, "Mon", "soon", "later"));
    }

    #[test]
    fn test_available_windows() {
        let blocks = vec![
            block("Mon", "13:00", "14:00"),
            block("Mon", "9:00", "10:30"),
            block("Mon", "10:00", "11:00"),
        ];
        let windows = available_windows(&blocks, "Mon");
        assert_eq!(
            windows,
            vec![
                ("06:00".to_string(), "09:00".to_string()),
                ("11:00".to_string(), "13:00".to_string()),
                ("14:00".to_string(), "23:00".to_string()),
            ]
        );
        assert_eq!(
            available_windows(&blocks, "Sun"),
            vec![("06:00".to_string(), "23:00".to_string())]
        );
    }

    #[test]
    fn test_summary() {
        assert_eq!(availability_summary(&[]), "Fully available");
        let summary = availability_summary(&[block("Mon", "9:00", "10:30"), block("Fri", "8", "9")]);
        assert_eq!(
            summary,
            "Free: Tue, Wed, Thu, Sat, Sun\nMon busy: 9:00-10:30\nFri busy: 8-9"
        );
    }
}
