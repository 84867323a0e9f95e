use crate::{
    activity::merge_activities,
    pages::{Identity, PageErrors, PageModel, ViewAggregator},
};
use serde::Serialize;
use trackboard_common::model::event::{Activity, PostKind};
use trackboard_db::repository::{ActivityFilter, TrackFilter, TrackOrder, TrackQuery, WeekdayCount};

pub const LAST_ACTIVITIES: u32 = 50;
const FEED_LIMIT: usize = 50;

/// The public dashboard.
#[derive(Clone, PartialEq, Debug, Default, Serialize)]
pub struct OpenPage {
    pub tracks: i64,
    pub total_duration_ms: i64,
    /// Sunday first.
    pub uploads_by_weekday: [i64; 7],
    pub last_activities: Vec<Activity>,
    pub track_drafts: i64,
    pub users: i64,
}

const WEEKDAY_CONTEXT: &str = "Cannot fetch uploads by weekday";

fn weekday_histogram(counts: Vec<WeekdayCount>, errors: &mut PageErrors) -> [i64; 7] {
    let mut histogram = [0; 7];
    for WeekdayCount { weekday, count } in counts {
        match usize::try_from(weekday)
            .ok()
            .and_then(|index| histogram.get_mut(index))
        {
            Some(slot) => *slot = count,
            None => errors.push(WEEKDAY_CONTEXT, format_args!("unexpected weekday {weekday}")),
        }
    }
    histogram
}

impl ViewAggregator {
    pub async fn open_page(&self, identity: &Identity) -> PageModel<OpenPage> {
        let mut context = self.begin(identity);
        let feed_filter = ActivityFilter::public_feed(self.settings.system_user_id);
        let public = TrackFilter::public();
        let all = TrackFilter::all();
        let draft_filter = TrackFilter::drafts();
        let feed_tracks = TrackQuery {
            filter: public,
            order: TrackOrder::CreatedAtDesc,
            limit: LAST_ACTIVITIES,
        };

        let (
            event,
            tracks,
            total_duration,
            weekdays,
            activity_tracks,
            activity_events,
            drafts,
            users,
        ) = tokio::join!(
            self.recorder
                .record_event(PostKind::ViewOpen, identity.user_id, None, None),
            self.repository.count_tracks(&public),
            self.repository.sum_track_duration(&public),
            self.repository.count_tracks_by_weekday(&all),
            self.repository.fetch_tracks(&feed_tracks),
            self.repository.fetch_events(&feed_filter, LAST_ACTIVITIES),
            self.repository.count_tracks(&draft_filter),
            self.repository.count_users(),
        );

        let errors = &mut context.errors;
        errors.check("Cannot write activity", event);
        let weekdays = errors.or_default(WEEKDAY_CONTEXT, weekdays);
        let page = OpenPage {
            tracks: errors.or_default("Cannot fetch last tracks", tracks),
            total_duration_ms: errors
                .or_default("Cannot fetch last track durations", total_duration),
            uploads_by_weekday: weekday_histogram(weekdays, errors),
            last_activities: merge_activities(
                errors.or_default("Cannot fetch last activities", activity_tracks),
                errors.or_default("Cannot fetch last activities", activity_events),
                FEED_LIMIT,
            ),
            track_drafts: errors.or_default("Cannot fetch last track drafts", drafts),
            users: errors.or_default("Cannot fetch last users", users),
        };

        context.finish(page)
    }
}

#[cfg(test)]
mod tests {
    use crate::pages::{PageErrors, open::weekday_histogram};
    use trackboard_db::repository::WeekdayCount;

    #[test]
    fn histogram_has_seven_days() {
        let mut errors = PageErrors::default();
        let histogram = weekday_histogram(
            vec![
                WeekdayCount { weekday: 0, count: 2 },
                WeekdayCount { weekday: 6, count: 5 },
            ],
            &mut errors,
        );

        assert_eq!(histogram, [2, 0, 0, 0, 0, 0, 5]);
        assert_eq!(errors.message(), None);

        let histogram = weekday_histogram(vec![WeekdayCount { weekday: 7, count: 1 }], &mut errors);
        assert_eq!(histogram, [0; 7]);
        assert_eq!(
            errors.message().as_deref(),
            Some("Cannot fetch uploads by weekday: unexpected weekday 7")
        );
    }
}
