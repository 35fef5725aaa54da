use crate::models::{BotIdentity, FeedEntry, FeedKind};
use crate::sanitize::{clean_up_html, escape_html};

/// Render an entry into the channel's HTML subset using the template for its feed.
///
/// Only the news description carries markup; every other field is escaped as text.
pub fn format(entry: &FeedEntry, kind: FeedKind, bot: &BotIdentity) -> String {
    let date = entry.published_at.to_rfc2822();
    let title = escape_html(&entry.title);
    let link = escape_html(&entry.link);
    let name = escape_html(&bot.display_name);
    match kind {
        FeedKind::News => format!(
            "\nArch Linux: Recent news updates\n\n\
             <b>{title}</b>\n\
             Date: {date}\n\n\
             {description}\n\n\
             {link}\n\n\
             - {name} [@{username}]\n",
            description = clean_up_html(&entry.description),
            username = bot.username,
        ),
        FeedKind::Packages => format!(
            "\nArch Linux: Recent package updates\n\n\
             <b>Date</b>\n{date}\n\
             <b>Category</b>\n{category}\n\
             <b>Package</b>\n<a href=\"{link}\">{title}</a>\n\
             <b>Description</b>\n{description}\n\n\
             - {name} [@{username}]\n",
            category = escape_html(&entry.tags.join(", ")),
            description = escape_html(&entry.description),
            username = bot.username,
        ),
    }
}
