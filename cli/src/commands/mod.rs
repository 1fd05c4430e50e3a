mod feed;
mod food;
mod goal;
mod helpers;
mod log;
mod mood;
mod summary;
mod sync;
mod water;
mod weight;

pub(crate) use feed::{cmd_feed_comment, cmd_feed_like, cmd_feed_list, cmd_feed_post};
pub(crate) use food::{cmd_food_add, cmd_food_list, cmd_search};
pub(crate) use goal::{cmd_goal_clear, cmd_goal_set, cmd_goal_show};
pub(crate) use log::{cmd_clear, cmd_delete, cmd_log};
pub(crate) use mood::cmd_mood;
pub(crate) use summary::{cmd_history, cmd_summary};
pub(crate) use sync::{DEFAULT_SYNC_INTERVAL_SECS, cmd_sync_now, cmd_sync_status, cmd_sync_watch};
pub(crate) use water::{cmd_water_add, cmd_water_set};
pub(crate) use weight::{cmd_weight_history, cmd_weight_log, cmd_weight_show};
