//! Diesel table definitions for the recap tables.
//!
//! The tables are owned by the reporting database and already exist; these
//! definitions must match them column for column.

diesel::table! {
    /// One row per recap user.
    user_recap_data (user_id) {
        user_id -> Int8,
        user_name -> Text,
        trx_count -> Int8,
        variant_count -> Nullable<Int8>,
        total_point -> Nullable<Int8>,
        total_point_description -> Nullable<Text>,
        total_point_possible_redeem -> Nullable<Int8>,
        total_point_image -> Nullable<Text>,
        delivery_count -> Nullable<Int8>,
        pickup_count -> Nullable<Int8>,
        cheaper_subs_desc -> Nullable<Text>,
        cheaper_subs_amount -> Nullable<Float8>,
        top_ranking -> Nullable<Int8>,
        /// JSON array of image URLs.
        list_circular_images -> Nullable<Jsonb>,
        created_at -> Timestamptz,
        /// Stamped on every upsert.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Favourite products; `display_order` is the zero-based list position.
    user_favorite_products (user_id, display_order) {
        user_id -> Int8,
        display_order -> Int4,
        product_name -> Text,
        count_cups -> Int8,
        product_image -> Nullable<Text>,
    }
}

diesel::table! {
    /// Favourite stores; `display_order` is the zero-based list position.
    user_favorite_stores (user_id, display_order) {
        user_id -> Int8,
        display_order -> Int4,
        store_name -> Text,
        transaction_count -> Int8,
        store_image -> Nullable<Text>,
    }
}

diesel::joinable!(user_favorite_products -> user_recap_data (user_id));
diesel::joinable!(user_favorite_stores -> user_recap_data (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    user_recap_data,
    user_favorite_products,
    user_favorite_stores,
);
