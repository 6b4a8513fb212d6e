//! Markdown templates for each alert channel

use crate::data::TaskRecord;

/// Render task ids as a newline-separated, highlighted list
pub fn format_task_ids<'a, I>(tasks: I) -> String
where
    I: IntoIterator<Item = &'a TaskRecord>,
{
    tasks
        .into_iter()
        .map(|task| format!("<font color=\"blue\">{}</font>", task.id))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tasks nobody has claimed within the allowed window
pub fn unclaimed_timeout(batch: usize, breaching: usize, registry_total: usize, task_ids: &str) -> String {
    format!(
        "**[SLA] Unclaimed timeout**\n\
         <font color=\"red\">{}</font> new merchant onboarding review task(s) have not been claimed in time. \
         Unclaimed past SLA right now: <font color=\"red\">{}</font>. \
         Unclaimed past SLA today: <font color=\"red\">{}</font>. Please pick them up.\n\
         Tasks:\n{}\n",
        batch, breaching, registry_total, task_ids
    )
}

/// Tasks claimed but not completed within the allowed window
pub fn unfinished_timeout(batch: usize, breaching: usize, registry_total: usize, task_ids: &str) -> String {
    format!(
        "**[SLA] Unfinished timeout**\n\
         <font color=\"red\">{}</font> new merchant onboarding review task(s) were claimed but not completed in time. \
         Unfinished past SLA right now: <font color=\"red\">{}</font>. \
         Unfinished past SLA today: <font color=\"red\">{}</font>. Please complete them.\n\
         Tasks:\n{}\n",
        batch, breaching, registry_total, task_ids
    )
}

/// Morning summary for the previous day
pub fn daily_stats(date: &str, unfinished_timeouts: usize, onboarded: u64) -> String {
    format!(
        "**[Daily report]**\n\
         Yesterday ({}):\n\
         - Onboarding submissions: <font color=\"blue\">{}</font>\n\
         - Unfinished past SLA: <font color=\"red\">{}</font>",
        date, onboarded, unfinished_timeouts
    )
}

/// Running onboarding count for today; `new_count` is omitted when zero
pub fn onboarding_progress(today_count: u64, new_count: u64, time: &str) -> String {
    if new_count > 0 {
        format!(
            "**[Onboarding]**\n\
             As of: {}\n\
             New since last report: <font color=\"green\">{}</font>\n\
             Total today: <font color=\"blue\">{}</font>",
            time, new_count, today_count
        )
    } else {
        format!(
            "**[Onboarding]**\n\
             As of: {}\n\
             Total today: <font color=\"blue\">{}</font>",
            time, today_count
        )
    }
}
