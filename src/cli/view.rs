use ansi_term::Colour;

use crate::{
    timer::snapshot::TimerSnapshot,
    utils::{percentage::seconds_percentage, time::format_hms},
};

const BAR_WIDTH: usize = 30;

/// Surface the controller renders snapshots on.
#[cfg_attr(test, mockall::automock)]
pub trait View {
    fn render(&mut self, snapshot: &TimerSnapshot);
}

/// Prints two stacked bars: work remaining against work passed, and procrastination
/// accumulated against what is left of the daily ceiling.
pub struct TerminalView {
    colored: bool,
}

impl TerminalView {
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }

    fn bar(&self, value: u64, whole: u64, filled: Colour, rest: Colour) -> String {
        let cells = bar_cells(value, whole, BAR_WIDTH);
        let filled_part = "█".repeat(cells);
        let rest_part = "░".repeat(BAR_WIDTH - cells);
        if self.colored {
            format!("{}{}", filled.paint(filled_part), rest.paint(rest_part))
        } else {
            format!("{filled_part}{rest_part}")
        }
    }
}

impl TerminalView {
    /// Text printed for `snapshot`, one entry per line.
    pub fn lines(&self, snapshot: &TimerSnapshot) -> [String; 3] {
        [
            format_state_line(snapshot),
            format!(
                "Work          {} {} left, {} passed ({} of {})",
                self.bar(
                    snapshot.time_left,
                    snapshot.work_budget,
                    Colour::Green,
                    Colour::Blue
                ),
                format_hms(snapshot.time_left),
                format_hms(snapshot.work_passed()),
                format_percentage(snapshot.work_passed(), snapshot.work_budget),
                format_hms(snapshot.work_budget),
            ),
            format!(
                "Procrastinate {} {} spent, {} left ({} of {})",
                self.bar(
                    snapshot.total_stop_time,
                    snapshot.stop_ceiling,
                    Colour::Red,
                    Colour::Blue
                ),
                format_hms(snapshot.total_stop_time),
                format_hms(snapshot.stop_remaining()),
                format_percentage(snapshot.total_stop_time, snapshot.stop_ceiling),
                format_hms(snapshot.stop_ceiling),
            ),
        ]
    }
}

impl View for TerminalView {
    fn render(&mut self, snapshot: &TimerSnapshot) {
        for line in self.lines(snapshot) {
            println!("{line}");
        }
    }
}

fn format_state_line(snapshot: &TimerSnapshot) -> String {
    let state = if snapshot.is_running {
        if snapshot.time_left == 0 {
            "done for today"
        } else {
            "working"
        }
    } else if snapshot.is_accumulating() {
        "procrastinating"
    } else {
        "idle"
    };
    match snapshot.first_start_time {
        Some(first) => format!(
            "{state}, first started at {}",
            first.with_timezone(&chrono::Local).format("%H:%M:%S")
        ),
        None => state.to_string(),
    }
}

fn format_percentage(value: u64, whole: u64) -> String {
    format!("{}%", *seconds_percentage(value, whole) as u32)
}

/// Number of filled cells out of `width`, rounded down so a bar is only full when the value is.
pub fn bar_cells(value: u64, whole: u64, width: usize) -> usize {
    if whole == 0 {
        return width;
    }
    let value = value.min(whole);
    (value as u128 * width as u128 / whole as u128) as usize
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::timer::{snapshot::TimerSnapshot, TimerState, STOP_CEILING_SECS};

    use super::{bar_cells, format_percentage, format_state_line, TerminalView, View};

    #[test]
    fn test_bar_cells() {
        assert_eq!(bar_cells(0, 100, 30), 0);
        assert_eq!(bar_cells(50, 100, 30), 15);
        assert_eq!(bar_cells(99, 100, 30), 29);
        assert_eq!(bar_cells(100, 100, 30), 30);
        assert_eq!(bar_cells(500, 100, 30), 30);
        assert_eq!(bar_cells(1, 0, 30), 30);
    }

    #[test]
    fn test_state_line() {
        let now = Utc.with_ymd_and_hms(2018, 7, 4, 12, 0, 0).unwrap();
        let mut state = TimerState::new(100);
        assert_eq!(format_state_line(&TimerSnapshot::new(&state, 100, now)), "idle");

        state.start(now);
        assert!(format_state_line(&TimerSnapshot::new(&state, 100, now)).starts_with("working"));

        state.stop(now);
        assert!(
            format_state_line(&TimerSnapshot::new(&state, 100, now)).starts_with("procrastinating")
        );
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(3600, 14400), "25%");
        assert_eq!(format_percentage(0, 0), "100%");
    }

    #[test]
    fn test_terminal_lines() {
        let now = Utc.with_ymd_and_hms(2018, 7, 4, 12, 0, 0).unwrap();
        let mut state = TimerState::new(100);
        state.time_left = 50;
        state.total_stop_time = STOP_CEILING_SECS / 2;
        let snapshot = TimerSnapshot::new(&state, 100, now);

        let [state_line, work, procrastinate] = TerminalView::new(false).lines(&snapshot);
        assert_eq!(state_line, "idle");
        assert_eq!(
            work,
            format!(
                "Work          {}{} 00:00:50 left, 00:00:50 passed (50% of 00:01:40)",
                "█".repeat(15),
                "░".repeat(15)
            )
        );
        assert_eq!(
            procrastinate,
            format!(
                "Procrastinate {}{} 12:00:00 spent, 12:00:00 left (50% of 24:00:00)",
                "█".repeat(15),
                "░".repeat(15)
            )
        );
    }

    #[test]
    fn test_colored_lines_keep_values() {
        let now = Utc.with_ymd_and_hms(2018, 7, 4, 12, 0, 0).unwrap();
        let snapshot = TimerSnapshot::new(&TimerState::new(100), 100, now);

        let [_, work, _] = TerminalView::new(true).lines(&snapshot);
        assert!(work.contains("\u{1b}["));
        assert!(work.contains("00:01:40 left"));

        // Printing goes through the same lines.
        TerminalView::new(true).render(&snapshot);
    }
}
