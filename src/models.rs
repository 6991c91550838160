use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use time::{Date, OffsetDateTime};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_joined: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub bio: String,
    pub location: String,
    pub birth_date: Option<Date>,
    pub phone_number: String,
    pub is_manager: bool,
    pub is_admin: bool,
}

/// Always selected with a computed `average_rating` column, the mean of the
/// hostel's review ratings (0.0 when it has none).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Hostel {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: String,
    pub price_per_night: f64,
    pub manager_id: i64,
    pub is_active: bool,
    pub amenities: Json<Vec<String>>,
    pub rules: Json<Vec<String>>,
    pub images: Json<Vec<String>>,
    pub average_rating: f64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomType {
    Single,
    Double,
    Triple,
    Quad,
    Dorm,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Room {
    pub id: i64,
    pub hostel_id: i64,
    pub room_number: String,
    pub room_type: RoomType,
    pub capacity: i64,
    pub price_per_night: f64,
    pub is_available: bool,
    pub amenities: Json<Vec<String>>,
    pub images: Json<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// PENDING -> CONFIRMED -> COMPLETED, with CANCELLED reachable from any
    /// non-terminal state. COMPLETED and CANCELLED have no exits.
    pub fn can_become(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        match (self, next) {
            (Pending, Confirmed) => true,
            (Confirmed, Completed) => true,
            (Pending | Confirmed, Cancelled) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub room_id: i64,
    pub check_in_date: Date,
    pub check_out_date: Date,
    pub status: BookingStatus,
    pub total_price: f64,
    pub special_requests: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: i64,
    pub user_id: i64,
    pub hostel_id: i64,
    pub rating: i64,
    pub comment: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Favorite {
    pub id: i64,
    pub user_id: i64,
    pub hostel_id: i64,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub is_read: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaintenanceStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl MaintenanceStatus {
    /// Closed requests accept no further status changes.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MaintenanceRequest {
    pub id: i64,
    pub user_id: i64,
    pub hostel_id: i64,
    pub title: String,
    pub description: String,
    pub status: MaintenanceStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ForumTopic {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub created_by: i64,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ForumPost {
    pub id: i64,
    pub topic_id: i64,
    pub author_id: i64,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct University {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub description: String,
    pub website: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CommunityCategory {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CommunityPost {
    pub id: i64,
    pub category_id: i64,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub is_pinned: bool,
    pub is_closed: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CommunityComment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::BookingStatus::*;

    #[test]
    fn booking_status_happy_path() {
        assert!(Pending.can_become(Confirmed));
        assert!(Confirmed.can_become(Completed));
    }

    #[test]
    fn booking_status_cancellation() {
        assert!(Pending.can_become(Cancelled));
        assert!(Confirmed.can_become(Cancelled));
        assert!(!Completed.can_become(Cancelled));
        assert!(!Cancelled.can_become(Cancelled));
    }

    #[test]
    fn booking_status_terminal_states_have_no_exits() {
        for terminal in [Cancelled, Completed] {
            assert!(terminal.is_terminal());
            for next in [Pending, Confirmed, Cancelled, Completed] {
                assert!(!terminal.can_become(next));
            }
        }
    }

    #[test]
    fn booking_status_no_skipping_confirmation() {
        assert!(!Pending.can_become(Completed));
        assert!(!Confirmed.can_become(Pending));
    }

    #[test]
    fn maintenance_status_terminal_states() {
        use super::MaintenanceStatus;

        assert!(MaintenanceStatus::Completed.is_terminal());
        assert!(MaintenanceStatus::Cancelled.is_terminal());
        assert!(!MaintenanceStatus::Pending.is_terminal());
        assert!(!MaintenanceStatus::InProgress.is_terminal());
    }
}
