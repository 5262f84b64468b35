//! Prompt templates for the three categoriser calls (spec §4.3). Kept as
//! plain functions rather than a templating engine since each prompt only
//! interpolates a handful of fields.

pub fn account_type_prompt(username: &str, bio: &str, posts_count: i64) -> (String, String) {
    let system = "You classify Instagram accounts into exactly one of: Personal, Business Page, \
                  Influencer, Theme Page. Respond with only that label, nothing else."
        .to_string();
    let user = format!("username: {username}\nbio: {bio}\npostsCount: {posts_count}");
    (system, user)
}

pub fn profile_category_prompt(username: &str, bio: &str, recent_captions: &[String]) -> (String, String) {
    let system = "You classify an Instagram profile into a three-level content category. \
                  Respond with strict JSON: {\"primary\": string, \"secondary\": string, \
                  \"tertiary\": string, \"confidence\": number between 0 and 1}."
        .to_string();
    let user = format!(
        "username: {username}\nbio: {bio}\nrecent captions:\n{}",
        recent_captions.join("\n")
    );
    (system, user)
}

pub fn content_category_prompt(description: &str, owner_category: &str) -> (String, String) {
    let system = "You classify a single piece of Instagram content into a three-level category \
                  plus up to 4 keywords. Respond with strict JSON: {\"primary\": string, \
                  \"secondary\": string, \"tertiary\": string, \"confidence\": number, \
                  \"keywords\": string[]}, with at most 4 keywords."
        .to_string();
    let user = format!("description: {description}\nowner category: {owner_category}");
    (system, user)
}
