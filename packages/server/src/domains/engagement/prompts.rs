//! Fixed outbound message copy.
//!
//! Template rendering proper is an external concern; these are the minimal
//! bodies the conversation handlers need. Patients never see raw errors:
//! every degraded path lands on [`FULL_SCALE`].

/// The full explicit scale, used for first prompts and every re-prompt.
pub const FULL_SCALE: &str = "How was your head today? Reply with a number:\n\
    1 = no headache\n\
    2 = mild, didn't get in the way\n\
    3 = moderate, pushed through\n\
    4 = bad, had to change plans\n\
    5 = severe, couldn't function";

pub const DAILY_CHECKIN: &str =
    "Daily check-in: how was your head today? Reply 1-5 (1 = headache-free, 5 = couldn't function).";

pub const ONBOARDING_CONSENT: &str =
    "Welcome to Daily Signal! We'll text you once a day to track how headaches affect your day. Reply YES to start.";

pub const ONBOARD_REMINDER: &str =
    "Just checking in - reply YES when you're ready to start your daily headache tracking.";

pub const WELCOME: &str =
    "You're all set! We'll check in every day at your preferred time. Reply STOP at any time to opt out.";

pub const STOP_CONFIRMATION: &str =
    "You've been unsubscribed and won't receive any more messages. Text START if you change your mind.";

pub const RE_ENGAGEMENT_NUDGE: &str =
    "We've missed you the last few days. Whenever you're ready, just reply with a number 1-5 for today.";

pub const DORMANT_NOTICE: &str =
    "We'll pause the daily check-ins for now. Reply RESTART whenever you want to pick tracking back up.";

pub const DORMANT_HELP: &str =
    "Your tracking is paused. Reply RESTART to begin a new tracking period.";

pub const TRANSITION_OPTIONS: &str =
    "You finished your tracking period! What's next? Reply:\n\
    1 = start another daily tracking period\n\
    2 = switch to weekly check-ins\n\
    3 = discuss treatment options";

pub const WEEKLY_ACK: &str =
    "Thanks - noted. We'll keep the daily check-ins coming.";

pub const WEEKLY_CADENCE_CONFIRMATION: &str =
    "Switched to weekly check-ins. We'll text you once a week from now on.";

pub const TREATMENT_CONFIRMATION: &str =
    "Got it. A member of the care team will reach out to discuss treatment options.";

pub const GENERIC_HELP: &str =
    "Sorry, we didn't catch that. Reply 1-5 to log today, or STOP to opt out.";

/// Ask the patient to confirm a level the pipeline was unsure about.
pub fn clarify(level: i32) -> String {
    format!(
        "Just to confirm - was today about a {} out of 5? Reply YES, or send the right number.",
        level
    )
}

pub fn checkin_ack(level: i32) -> String {
    match level {
        1 => "Logged: headache-free day. Great news!".to_string(),
        2 => "Logged: 2/5. Glad it stayed out of your way.".to_string(),
        n => format!("Logged: {}/5. Thanks for checking in - it all helps the bigger picture.", n),
    }
}

/// The three rotating weekly question kinds (sprint days 7/14/21/28).
pub fn weekly_question(rotation: usize) -> &'static str {
    match rotation % 3 {
        0 => "Weekly question: did you notice anything that seemed to trigger your worst days this week?",
        1 => "Weekly question: how many days this week did you take something for a headache?",
        _ => "Weekly question: how did headaches affect your sleep this week?",
    }
}

pub fn insight(day_count: i32, days_completed: i32, days_missed: i32) -> String {
    format!(
        "Day {} insight: you've logged {} days so far ({} missed). Every entry sharpens the picture of what your headaches respond to.",
        day_count, days_completed, days_missed
    )
}
