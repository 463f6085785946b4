use std::future::Future;

use chrono::{Duration, Local, NaiveDateTime, NaiveTime};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Hourly,
    Daily(NaiveTime),
}

/// Time until the next run: an hour from now, or the next occurrence of the
/// daily time strictly after `now`.
pub fn next_delay(frequency: Frequency, now: NaiveDateTime) -> Duration {
    match frequency {
        Frequency::Hourly => Duration::hours(1),
        Frequency::Daily(at) => {
            let mut target = now.date().and_time(at);
            if target <= now {
                target += Duration::days(1);
            }
            target - now
        }
    }
}

/// Runs `task` after each scheduled delay, `runs` times or forever.
pub async fn run_schedule<F, Fut>(frequency: Frequency, runs: Option<usize>, mut task: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut completed = 0;
    while runs.map_or(true, |limit| completed < limit) {
        let now = Local::now().naive_local();
        let delay = next_delay(frequency, now);
        info!(
            next_run = %(now + delay).format("%Y-%m-%d %H:%M:%S"),
            "scheduler waiting"
        );
        tokio::time::sleep(delay.to_std().unwrap_or_default()).await;
        info!("scheduler: executing scheduled fetch");
        task().await;
        completed += 1;
    }
    info!(runs = completed, "scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn hourly_waits_one_hour() {
        assert_eq!(next_delay(Frequency::Hourly, at(9, 30)), Duration::hours(1));
    }

    #[test]
    fn daily_runs_later_today_when_time_is_ahead() {
        let delay = next_delay(Frequency::Daily(time(17, 0)), at(9, 30));
        assert_eq!(delay, Duration::minutes(7 * 60 + 30));
    }

    #[test]
    fn daily_rolls_to_tomorrow_once_time_has_passed() {
        assert_eq!(
            next_delay(Frequency::Daily(time(9, 30)), at(9, 30)),
            Duration::days(1)
        );
        assert_eq!(
            next_delay(Frequency::Daily(time(8, 0)), at(9, 0)),
            Duration::hours(23)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn limited_schedule_runs_the_task_each_time() {
        let mut count = 0;
        run_schedule(Frequency::Hourly, Some(3), || {
            count += 1;
            async {}
        })
        .await;
        assert_eq!(count, 3);
    }
}
