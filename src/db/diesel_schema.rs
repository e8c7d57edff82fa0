// Kept in sync by hand with the DDL in schema.rs.

diesel::table! {
    profiles (id) {
        id -> Text,
        email -> Nullable<Text>,
        user_type -> Text,
        display_name -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    organizations (id) {
        id -> Text,
        name -> Text,
        org_type -> Text,
        description -> Nullable<Text>,
        location -> Nullable<Text>,
        delivery_days_json -> Nullable<Text>,
        pickup_available -> Integer,
        delivery_notes -> Nullable<Text>,
        created_by -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    organization_members (organization_id, user_id) {
        organization_id -> Text,
        user_id -> Text,
        role -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    products (id) {
        id -> Text,
        organization_id -> Text,
        name -> Text,
        description -> Nullable<Text>,
        category -> Text,
        price -> Double,
        quantity -> Double,
        unit -> Text,
        location -> Nullable<Text>,
        image_url -> Nullable<Text>,
        available -> Integer,
        is_surplus -> Integer,
        surplus_reason -> Nullable<Text>,
        discount_percentage -> Nullable<Integer>,
        created_by -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    demand_requests (id) {
        id -> Text,
        organization_id -> Text,
        product_name -> Text,
        category -> Text,
        quantity -> Double,
        unit -> Text,
        description -> Nullable<Text>,
        frequency -> Text,
        start_date -> Text,
        end_date -> Nullable<Text>,
        preferred_radius_miles -> Integer,
        status -> Text,
        created_by -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    demand_offers (id) {
        id -> Text,
        demand_request_id -> Text,
        farm_organization_id -> Text,
        offered_quantity -> Double,
        offered_price -> Double,
        message -> Nullable<Text>,
        status -> Text,
        created_by -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    commitments (id) {
        id -> Text,
        demand_request_id -> Nullable<Text>,
        demand_offer_id -> Nullable<Text>,
        restaurant_organization_id -> Text,
        farm_organization_id -> Text,
        product_name -> Text,
        quantity -> Double,
        unit -> Text,
        price -> Double,
        frequency -> Text,
        start_date -> Text,
        end_date -> Nullable<Text>,
        next_delivery_date -> Nullable<Text>,
        status -> Text,
        created_by -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    commitment_deliveries (id) {
        id -> Text,
        commitment_id -> Text,
        scheduled_date -> Text,
        completed_date -> Nullable<Text>,
        quantity_delivered -> Nullable<Double>,
        status -> Text,
        notes -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    messages (id) {
        id -> Text,
        from_organization_id -> Text,
        to_organization_id -> Text,
        product_id -> Nullable<Text>,
        subject -> Text,
        message -> Text,
        sender_id -> Text,
        is_read -> Integer,
        created_at -> Text,
    }
}

diesel::table! {
    organization_reliability (organization_id) {
        organization_id -> Text,
        total_commitments -> Integer,
        completed_commitments -> Integer,
        on_time_deliveries -> Integer,
        total_deliveries -> Integer,
        active_partnerships -> Integer,
        updated_at -> Text,
    }
}

diesel::joinable!(organization_members -> organizations (organization_id));
diesel::joinable!(products -> organizations (organization_id));
diesel::joinable!(demand_requests -> organizations (organization_id));
diesel::joinable!(demand_offers -> demand_requests (demand_request_id));
diesel::joinable!(commitment_deliveries -> commitments (commitment_id));

diesel::allow_tables_to_appear_in_same_query!(
    profiles,
    organizations,
    organization_members,
    products,
    demand_requests,
    demand_offers,
    commitments,
    commitment_deliveries,
    messages,
    organization_reliability,
);
