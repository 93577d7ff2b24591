/// Router Module Index
///
/// Routes are grouped by who may see them. Access control is attached to each
/// group as a layer in `create_router`, so a page cannot be registered without
/// its guard.

/// Pages anyone may open (marketing, listings, login).
pub mod public;

/// The user and member dashboards. Both mount the same pages; the guard layer
/// decides which role gets in.
pub mod dashboard;

/// The admin dashboard, including coupon management.
pub mod admin;
