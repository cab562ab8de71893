pub mod answer;
pub mod counsellor_note;
pub mod interpreted_result;
pub mod question;
pub mod score;
pub mod section;
pub mod section_progress;
pub mod test_attempt;
pub mod user;
