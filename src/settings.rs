use std::{ops::Not, time::Duration};

use structopt::StructOpt;

// Limits and toggles for push processing.
//
// These should be injected into the host's `StructOpt` implementation using
// the `flatten` attribute.
#[derive(Clone, Debug, PartialEq, Eq, StructOpt)]
pub struct Settings {
    #[structopt(
        long,
        default_value = "3",
        help = "largest group of same-kind ref changes that still executes webhooks"
    )]
    pub webhook_fanout_limit: usize,

    #[structopt(
        long,
        default_value = "3",
        help = "largest group of same-kind ref changes that still records one event per change"
    )]
    pub activity_event_limit: usize,

    #[structopt(
        long,
        default_value = "4",
        help = "number of ref changes per push that create pipelines"
    )]
    pub pipeline_fanout_limit: usize,

    #[structopt(long, help = "create pipelines for every ref change in a push")]
    pub create_all_pipelines: bool,

    #[structopt(
        long,
        default_value = "20",
        help = "number of commits per issue tracker sync job"
    )]
    pub issue_tracker_batch_size: usize,

    #[structopt(
        long,
        default_value = "10s",
        parse(try_from_str = parse_duration::parse::parse),
        help = "delay between consecutive issue tracker sync jobs"
    )]
    pub issue_tracker_batch_delay: Duration,

    #[structopt(
        long = "no-issue-tracker-batching",
        parse(from_flag = Not::not),
        help = "sync all commits of a ref change in a single issue tracker job"
    )]
    pub issue_tracker_batching: bool,

    #[structopt(
        long = "no-agent-notifications",
        parse(from_flag = Not::not),
        help = "do not notify connected agents of pushes"
    )]
    pub agent_notifications: bool,

    #[structopt(
        long = "no-wiki-housekeeping",
        parse(from_flag = Not::not),
        help = "do not count wiki pushes towards wiki housekeeping"
    )]
    pub wiki_housekeeping: bool,

    #[structopt(flatten)]
    pub housekeeping: HousekeepingSettings,
}

#[derive(Clone, Debug, PartialEq, Eq, StructOpt)]
pub struct HousekeepingSettings {
    #[structopt(
        long,
        default_value = "10",
        help = "pushes between incremental repacks"
    )]
    pub incremental_repack_period: u64,

    #[structopt(long, default_value = "50", help = "pushes between full repacks")]
    pub full_repack_period: u64,

    #[structopt(long, default_value = "200", help = "pushes between garbage collections")]
    pub gc_period: u64,

    #[structopt(
        long,
        default_value = "24h",
        parse(try_from_str = parse_duration::parse::parse),
        help = "how long a repository is locked against concurrent housekeeping"
    )]
    pub housekeeping_lease: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            webhook_fanout_limit: 3,
            activity_event_limit: 3,
            pipeline_fanout_limit: 4,
            create_all_pipelines: false,
            issue_tracker_batch_size: 20,
            issue_tracker_batch_delay: Duration::from_secs(10),
            issue_tracker_batching: true,
            agent_notifications: true,
            wiki_housekeeping: true,
            housekeeping: HousekeepingSettings::default(),
        }
    }
}

impl Default for HousekeepingSettings {
    fn default() -> Self {
        Self {
            incremental_repack_period: 10,
            full_repack_period: 50,
            gc_period: 200,
            housekeeping_lease: Duration::from_secs(24 * 60 * 60),
        }
    }
}
