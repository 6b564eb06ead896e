diesel::table! {
  track (id) {
    id -> Integer,
    title -> Text,
    artist -> Text,
    album -> Nullable<Text>,
    release_year -> Nullable<Integer>,
    image_url -> Nullable<Text>,
    created_at -> Timestamp,
  }
}

diesel::table! {
  user (id) {
    id -> Integer,
    username -> Text,
    email -> Text,
    provider_id -> Nullable<Text>,
    display_name -> Nullable<Text>,
    hash -> Binary,
    salt -> Binary,
    created_at -> Timestamp,
  }
}

diesel::table! {
  rating (id) {
    id -> Integer,
    user_id -> Integer,
    track_id -> Integer,
    #[sql_name = "rating"]
    score -> Integer,
    comment -> Nullable<Text>,
    created_at -> Timestamp,
    updated_at -> Timestamp,
  }
}

diesel::table! {
  tracked_track (id) {
    id -> Integer,
    user_id -> Integer,
    track_id -> Integer,
    tracked_at -> Timestamp,
    notes -> Nullable<Text>,
    play_count -> Integer,
  }
}

diesel::joinable!(rating -> track (track_id));
diesel::joinable!(rating -> user (user_id));
diesel::joinable!(tracked_track -> track (track_id));
diesel::joinable!(tracked_track -> user (user_id));

diesel::allow_tables_to_appear_in_same_query!(
  track,
  user,
  rating,
  tracked_track,
);
