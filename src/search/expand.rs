// Inline expansion of `includes` into result objects.
//
// The v2 API returns referenced users, media, polls, places, and tweets in a
// separate `includes` block and only ids on the post itself. The "atomic"
// output format stitches them back together so each yielded post stands on
// its own. Lookups that miss produce an empty object rather than an error.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Lookup tables built from one page's `includes` block.
#[derive(Debug, Default, Clone)]
pub struct Includes {
    /// Users keyed by both `id` and `username` (mentions carry only the username).
    users: HashMap<String, Value>,
    tweets: HashMap<String, Value>,
    media: HashMap<String, Value>,
    polls: HashMap<String, Value>,
    places: HashMap<String, Value>,
}

impl Includes {
    /// Index an `includes` object. Included tweets are themselves expanded
    /// against the other tables before any post is expanded.
    pub fn from_value(includes: Option<&Value>) -> Self {
        let Some(includes) = includes else {
            return Self::default();
        };

        let mut users = index_by(includes, "users", "id");
        users.extend(index_by(includes, "users", "username"));

        let mut indexed = Self {
            users,
            tweets: index_by(includes, "tweets", "id"),
            media: index_by(includes, "media", "media_key"),
            polls: index_by(includes, "polls", "id"),
            places: index_by(includes, "places", "id"),
        };

        let expanded_tweets: HashMap<String, Value> = indexed
            .tweets
            .iter()
            .map(|(id, tweet)| (id.clone(), indexed.expand(tweet.clone())))
            .collect();
        indexed.tweets = expanded_tweets;

        indexed
    }

    /// Recursively expand a payload, attaching included objects next to the
    /// ids that reference them.
    pub fn expand(&self, payload: Value) -> Value {
        match payload {
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.expand(v)).collect()),
            Value::Object(map) => {
                let expanded: Map<String, Value> =
                    map.into_iter().map(|(k, v)| (k, self.expand(v))).collect();
                Value::Object(self.attach(expanded))
            }
            primitive => primitive,
        }
    }

    fn attach(&self, mut obj: Map<String, Value>) -> Map<String, Value> {
        if let Some(id) = obj.get("author_id").and_then(Value::as_str) {
            let author = lookup(&self.users, id);
            obj.insert("author".to_string(), author);
        }

        if let Some(id) = obj.get("in_reply_to_user_id").and_then(Value::as_str) {
            let user = lookup(&self.users, id);
            obj.insert("in_reply_to_user".to_string(), user);
        }

        if let Some(keys) = obj.get("media_keys").and_then(Value::as_array) {
            let media: Vec<Value> = keys
                .iter()
                .filter_map(Value::as_str)
                .map(|k| lookup(&self.media, k))
                .collect();
            obj.insert("media".to_string(), Value::Array(media));
        }

        // Only one poll per post.
        if let Some(poll_id) = obj
            .get("poll_ids")
            .and_then(Value::as_array)
            .and_then(|ids| ids.last())
            .and_then(Value::as_str)
        {
            let poll = lookup(&self.polls, poll_id);
            obj.insert("poll".to_string(), poll);
        }

        // Place objects carry their own `geo` (a bbox) without a place_id.
        let place_id = obj
            .get("geo")
            .and_then(|g| g.get("place_id"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if let (Some(place_id), Some(geo)) = (place_id, obj.get("geo").cloned()) {
            let merged = merge_objects(geo, lookup(&self.places, &place_id));
            obj.insert("geo".to_string(), merged);
        }

        if let Some(mentions) = obj.get("mentions").and_then(Value::as_array).cloned() {
            let merged: Vec<Value> = mentions
                .into_iter()
                .map(|m| {
                    let user = m
                        .get("username")
                        .and_then(Value::as_str)
                        .map(|u| lookup(&self.users, u))
                        .unwrap_or_else(empty_object);
                    merge_objects(m, user)
                })
                .collect();
            obj.insert("mentions".to_string(), Value::Array(merged));
        }

        if let Some(refs) = obj.get("referenced_tweets").and_then(Value::as_array).cloned() {
            let merged: Vec<Value> = refs
                .into_iter()
                .map(|r| {
                    let tweet = r
                        .get("id")
                        .and_then(Value::as_str)
                        .map(|id| lookup(&self.tweets, id))
                        .unwrap_or_else(empty_object);
                    merge_objects(r, tweet)
                })
                .collect();
            obj.insert("referenced_tweets".to_string(), Value::Array(merged));
        }

        if let Some(id) = obj.get("pinned_tweet_id").and_then(Value::as_str) {
            let pinned = lookup(&self.tweets, id);
            obj.insert("pinned_tweet".to_string(), pinned);
        }

        obj
    }
}

fn index_by(includes: &Value, section: &str, key: &str) -> HashMap<String, Value> {
    includes
        .get(section)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let k = item.get(key)?.as_str()?;
                    Some((k.to_string(), item.clone()))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn lookup(table: &HashMap<String, Value>, key: &str) -> Value {
    table.get(key).cloned().unwrap_or_else(empty_object)
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Shallow merge; keys from `over` win.
fn merge_objects(base: Value, over: Value) -> Value {
    match (base, over) {
        (Value::Object(mut b), Value::Object(o)) => {
            b.extend(o);
            Value::Object(b)
        }
        (base, _) => base,
    }
}
