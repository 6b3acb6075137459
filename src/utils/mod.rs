pub mod db_utils;
pub mod hhmm;
pub mod pagination;
pub mod usernames;
