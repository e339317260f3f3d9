mod login;
mod received;

pub use login::{DashboardPage, LoginPage};
pub use received::{NumbersPage, SmsPage, SummaryPage};
