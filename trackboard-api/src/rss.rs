use crate::config::SiteSettings;
use time::{OffsetDateTime, UtcDateTime, format_description::well_known::Rfc2822};
use trackboard_common::{model::track::FullTrack, util::escape_markup};

pub const RSS_TRACKS: u32 = 50;

fn rfc2822(value: UtcDateTime) -> Result<String, time::error::Format> {
    OffsetDateTime::new_utc(value.date(), value.time()).format(&Rfc2822)
}

/// Renders an RSS 2.0 document listing the given tracks.
pub fn render_feed(
    settings: &SiteSettings,
    tracks: &[FullTrack],
) -> Result<String, time::error::Format> {
    let site_title = escape_markup(&settings.title);
    let site_url = escape_markup(&settings.public_url);

    let mut document = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    document.push_str("<rss version=\"2.0\">\n<channel>\n");
    document.push_str(&format!(
        "<title>{site_title}</title>\n<link>{site_url}</link>\n\
         <description>Latest tracks on {site_title}</description>\n"
    ));

    for track in tracks {
        let link = escape_markup(&format!("{}{}", settings.public_url, track.canonical_url))
            .into_owned();
        document.push_str(&format!(
            "<item>\n<title>{title}</title>\n<link>{link}</link>\n\
             <guid isPermaLink=\"true\">{link}</guid>\n<pubDate>{date}</pubDate>\n\
             <author>{author}</author>\n<description>{description}</description>\n</item>\n",
            title = escape_markup(&track.track.title),
            date = rfc2822(track.track.sort_date)?,
            author = escape_markup(&track.author.display_name()),
            description = escape_markup(&track.track.body),
        ));
    }

    document.push_str("</channel>\n</rss>\n");
    Ok(document)
}
