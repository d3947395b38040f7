//! Database repository for CRUD operations.
//!
//! Every write runs in a transaction that also bumps the global revision, so a
//! returned entity is always durably committed before anyone publishes it.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    Accommodation, CreateAccommodationRequest, CreateFileRequest, CreatePlaceRequest,
    CreateShareRequest, CreateTripRequest, Place, PlaceFile, RevisionInfo, Share, ShareRole, Trip,
    TripFile, TripSnapshot, UpdateAccommodationRequest, UpdatePlaceRequest, UpdateTripRequest,
};

const TRIP_COLUMNS: &str =
    "id, owner_id, name, description, start_date, end_date, created_at, updated_at";
const PLACE_COLUMNS: &str = "id, trip_id, name, address, latitude, longitude, visit_date, visit_time, category, notes, created_at, updated_at";
const ACCOMMODATION_COLUMNS: &str =
    "id, trip_id, name, address, check_in, check_out, confirmation, notes, created_at, updated_at";
const TRIP_FILE_COLUMNS: &str =
    "id, trip_id, file_name, url, content_type, size_bytes, uploaded_by, created_at";
const PLACE_FILE_COLUMNS: &str =
    "id, place_id, trip_id, file_name, url, content_type, size_bytes, uploaded_by, created_at";
const SHARE_COLUMNS: &str = "id, trip_id, user_id, role, created_at";

/// How a user relates to a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripAccess {
    Owner,
    Collaborator(ShareRole),
}

impl TripAccess {
    /// Owners and editors may change trip content.
    pub fn can_edit(&self) -> bool {
        matches!(
            self,
            TripAccess::Owner | TripAccess::Collaborator(ShareRole::Editor)
        )
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, TripAccess::Owner)
    }
}

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Get revision info.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            revision_id: row.get("revision_id"),
            generated_at: row.get("generated_at"),
        })
    }

    /// Increment the revision inside the caller's transaction.
    async fn bump_revision(conn: &mut SqliteConnection) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Full snapshot of a trip's collections for a client refetch.
    pub async fn get_snapshot(&self, trip_id: &str) -> Result<TripSnapshot, AppError> {
        let trip = self
            .get_trip(trip_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Trip {} not found", trip_id)))?;
        let revision = self.get_revision_info().await?;

        Ok(TripSnapshot {
            revision_id: revision.revision_id,
            generated_at: revision.generated_at,
            trip,
            places: self.list_places(trip_id).await?,
            accommodations: self.list_accommodations(trip_id).await?,
            files: self.list_trip_files(trip_id).await?,
            shares: self.list_shares(trip_id).await?,
        })
    }

    // ==================== ACCESS ====================

    /// Resolve how `user_id` may access a trip. `None` if the trip is missing
    /// or not visible to the user.
    pub async fn trip_access(
        &self,
        trip_id: &str,
        user_id: &str,
    ) -> Result<Option<TripAccess>, AppError> {
        let Some(trip) = self.get_trip(trip_id).await? else {
            return Ok(None);
        };
        if trip.owner_id == user_id {
            return Ok(Some(TripAccess::Owner));
        }

        let row = sqlx::query("SELECT role FROM shares WHERE trip_id = ? AND user_id = ?")
            .bind(trip_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row
            .and_then(|r| ShareRole::parse(r.get::<String, _>("role").as_str()))
            .map(TripAccess::Collaborator))
    }

    /// Every user who can see a trip: the owner and all collaborators.
    pub async fn trip_members(&self, trip_id: &str) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(
            "SELECT owner_id AS user_id FROM trips WHERE id = ? UNION SELECT user_id FROM shares WHERE trip_id = ?",
        )
        .bind(trip_id)
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("user_id")).collect())
    }

    // ==================== TRIP OPERATIONS ====================

    /// List the trips a user owns or collaborates on.
    pub async fn list_trips_for_user(&self, user_id: &str) -> Result<Vec<Trip>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM trips WHERE owner_id = ? OR id IN (SELECT trip_id FROM shares WHERE user_id = ?) ORDER BY start_date, name",
            TRIP_COLUMNS
        ))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(trip_from_row).collect())
    }

    /// Get a trip by ID.
    pub async fn get_trip(&self, id: &str) -> Result<Option<Trip>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM trips WHERE id = ?", TRIP_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(trip_from_row))
    }

    /// Create a new trip owned by `owner_id`.
    pub async fn create_trip(
        &self,
        owner_id: &str,
        request: &CreateTripRequest,
    ) -> Result<Trip, AppError> {
        let now = Utc::now().to_rfc3339();
        let trip = Trip {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: request.name.clone(),
            description: request.description.clone(),
            start_date: request.start_date,
            end_date: request.end_date,
            created_at: now.clone(),
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO trips (id, owner_id, name, description, start_date, end_date, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&trip.id)
        .bind(&trip.owner_id)
        .bind(&trip.name)
        .bind(&trip.description)
        .bind(trip.start_date)
        .bind(trip.end_date)
        .bind(&trip.created_at)
        .bind(&trip.updated_at)
        .execute(&mut *tx)
        .await?;
        Self::bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(trip)
    }

    /// Update a trip. Last write wins.
    pub async fn update_trip(&self, id: &str, request: &UpdateTripRequest) -> Result<Trip, AppError> {
        let mut trip = self
            .get_trip(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Trip {} not found", id)))?;
        request.apply_to(&mut trip);
        trip.updated_at = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE trips SET name = ?, description = ?, start_date = ?, end_date = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&trip.name)
        .bind(&trip.description)
        .bind(trip.start_date)
        .bind(trip.end_date)
        .bind(&trip.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Trip {} not found", id)));
        }

        Self::bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(trip)
    }

    /// Delete a trip and, by cascade, everything it owns.
    pub async fn delete_trip(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM trips WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Trip {} not found", id)));
        }

        Self::bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    // ==================== PLACE OPERATIONS ====================

    /// List the places of a trip.
    pub async fn list_places(&self, trip_id: &str) -> Result<Vec<Place>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM places WHERE trip_id = ? ORDER BY created_at, id",
            PLACE_COLUMNS
        ))
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(place_from_row).collect())
    }

    /// Get a place by ID.
    pub async fn get_place(&self, id: &str) -> Result<Option<Place>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM places WHERE id = ?", PLACE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(place_from_row))
    }

    /// Create a place in a trip.
    pub async fn create_place(
        &self,
        trip_id: &str,
        request: &CreatePlaceRequest,
    ) -> Result<Place, AppError> {
        let now = Utc::now().to_rfc3339();
        let place = Place {
            id: uuid::Uuid::new_v4().to_string(),
            trip_id: trip_id.to_string(),
            name: request.name.clone(),
            address: request.address.clone(),
            latitude: request.latitude,
            longitude: request.longitude,
            visit_date: request.visit_date,
            visit_time: request.visit_time.clone(),
            category: request.category.clone(),
            notes: request.notes.clone(),
            created_at: now.clone(),
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO places (id, trip_id, name, address, latitude, longitude, visit_date, visit_time, category, notes, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&place.id)
        .bind(&place.trip_id)
        .bind(&place.name)
        .bind(&place.address)
        .bind(place.latitude)
        .bind(place.longitude)
        .bind(place.visit_date)
        .bind(&place.visit_time)
        .bind(&place.category)
        .bind(&place.notes)
        .bind(&place.created_at)
        .bind(&place.updated_at)
        .execute(&mut *tx)
        .await?;
        Self::bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(place)
    }

    /// Update a place belonging to `trip_id`. Last write wins.
    pub async fn update_place(
        &self,
        trip_id: &str,
        id: &str,
        request: &UpdatePlaceRequest,
    ) -> Result<Place, AppError> {
        let mut place = self
            .get_place(id)
            .await?
            .filter(|p| p.trip_id == trip_id)
            .ok_or_else(|| AppError::NotFound(format!("Place {} not found", id)))?;
        request.apply_to(&mut place);
        place.updated_at = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE places SET name = ?, address = ?, latitude = ?, longitude = ?, visit_date = ?, visit_time = ?, category = ?, notes = ?, updated_at = ? WHERE id = ? AND trip_id = ?",
        )
        .bind(&place.name)
        .bind(&place.address)
        .bind(place.latitude)
        .bind(place.longitude)
        .bind(place.visit_date)
        .bind(&place.visit_time)
        .bind(&place.category)
        .bind(&place.notes)
        .bind(&place.updated_at)
        .bind(id)
        .bind(trip_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Place {} not found", id)));
        }

        Self::bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(place)
    }

    /// Delete a place and its attached files.
    pub async fn delete_place(&self, trip_id: &str, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM places WHERE id = ? AND trip_id = ?")
            .bind(id)
            .bind(trip_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Place {} not found", id)));
        }

        Self::bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    // ==================== ACCOMMODATION OPERATIONS ====================

    /// List the accommodations of a trip, earliest check-in first.
    pub async fn list_accommodations(&self, trip_id: &str) -> Result<Vec<Accommodation>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accommodations WHERE trip_id = ? ORDER BY check_in, id",
            ACCOMMODATION_COLUMNS
        ))
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(accommodation_from_row).collect())
    }

    /// Get an accommodation by ID.
    pub async fn get_accommodation(&self, id: &str) -> Result<Option<Accommodation>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accommodations WHERE id = ?",
            ACCOMMODATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(accommodation_from_row))
    }

    /// Create an accommodation in a trip.
    pub async fn create_accommodation(
        &self,
        trip_id: &str,
        request: &CreateAccommodationRequest,
    ) -> Result<Accommodation, AppError> {
        let now = Utc::now().to_rfc3339();
        let stay = Accommodation {
            id: uuid::Uuid::new_v4().to_string(),
            trip_id: trip_id.to_string(),
            name: request.name.clone(),
            address: request.address.clone(),
            check_in: request.check_in,
            check_out: request.check_out,
            confirmation: request.confirmation.clone(),
            notes: request.notes.clone(),
            created_at: now.clone(),
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO accommodations (id, trip_id, name, address, check_in, check_out, confirmation, notes, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&stay.id)
        .bind(&stay.trip_id)
        .bind(&stay.name)
        .bind(&stay.address)
        .bind(stay.check_in)
        .bind(stay.check_out)
        .bind(&stay.confirmation)
        .bind(&stay.notes)
        .bind(&stay.created_at)
        .bind(&stay.updated_at)
        .execute(&mut *tx)
        .await?;
        Self::bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(stay)
    }

    /// Update an accommodation belonging to `trip_id`. Last write wins.
    pub async fn update_accommodation(
        &self,
        trip_id: &str,
        id: &str,
        request: &UpdateAccommodationRequest,
    ) -> Result<Accommodation, AppError> {
        let mut stay = self
            .get_accommodation(id)
            .await?
            .filter(|a| a.trip_id == trip_id)
            .ok_or_else(|| AppError::NotFound(format!("Accommodation {} not found", id)))?;
        request.apply_to(&mut stay);
        if stay.check_out < stay.check_in {
            return Err(AppError::Validation(
                "checkOut must not be before checkIn".to_string(),
            ));
        }
        stay.updated_at = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE accommodations SET name = ?, address = ?, check_in = ?, check_out = ?, confirmation = ?, notes = ?, updated_at = ? WHERE id = ? AND trip_id = ?",
        )
        .bind(&stay.name)
        .bind(&stay.address)
        .bind(stay.check_in)
        .bind(stay.check_out)
        .bind(&stay.confirmation)
        .bind(&stay.notes)
        .bind(&stay.updated_at)
        .bind(id)
        .bind(trip_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Accommodation {} not found", id)));
        }

        Self::bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(stay)
    }

    /// Delete an accommodation.
    pub async fn delete_accommodation(&self, trip_id: &str, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM accommodations WHERE id = ? AND trip_id = ?")
            .bind(id)
            .bind(trip_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Accommodation {} not found", id)));
        }

        Self::bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    // ==================== FILE OPERATIONS ====================

    /// List the files attached to a trip.
    pub async fn list_trip_files(&self, trip_id: &str) -> Result<Vec<TripFile>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM trip_files WHERE trip_id = ? ORDER BY created_at, id",
            TRIP_FILE_COLUMNS
        ))
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(trip_file_from_row).collect())
    }

    /// Record an uploaded file against a trip.
    pub async fn create_trip_file(
        &self,
        trip_id: &str,
        uploaded_by: &str,
        request: &CreateFileRequest,
    ) -> Result<TripFile, AppError> {
        let file = TripFile {
            id: uuid::Uuid::new_v4().to_string(),
            trip_id: trip_id.to_string(),
            file_name: request.file_name.clone(),
            url: request.url.clone(),
            content_type: request.content_type.clone(),
            size_bytes: request.size_bytes,
            uploaded_by: uploaded_by.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO trip_files (id, trip_id, file_name, url, content_type, size_bytes, uploaded_by, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&file.id)
        .bind(&file.trip_id)
        .bind(&file.file_name)
        .bind(&file.url)
        .bind(&file.content_type)
        .bind(file.size_bytes)
        .bind(&file.uploaded_by)
        .bind(&file.created_at)
        .execute(&mut *tx)
        .await?;
        Self::bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(file)
    }

    /// Delete a trip file.
    pub async fn delete_trip_file(&self, trip_id: &str, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM trip_files WHERE id = ? AND trip_id = ?")
            .bind(id)
            .bind(trip_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("File {} not found", id)));
        }

        Self::bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// List the files attached to a place.
    pub async fn list_place_files(&self, place_id: &str) -> Result<Vec<PlaceFile>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM place_files WHERE place_id = ? ORDER BY created_at, id",
            PLACE_FILE_COLUMNS
        ))
        .bind(place_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(place_file_from_row).collect())
    }

    /// Record an uploaded file against a place.
    pub async fn create_place_file(
        &self,
        place: &Place,
        uploaded_by: &str,
        request: &CreateFileRequest,
    ) -> Result<PlaceFile, AppError> {
        let file = PlaceFile {
            id: uuid::Uuid::new_v4().to_string(),
            place_id: place.id.clone(),
            trip_id: place.trip_id.clone(),
            file_name: request.file_name.clone(),
            url: request.url.clone(),
            content_type: request.content_type.clone(),
            size_bytes: request.size_bytes,
            uploaded_by: uploaded_by.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO place_files (id, place_id, trip_id, file_name, url, content_type, size_bytes, uploaded_by, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&file.id)
        .bind(&file.place_id)
        .bind(&file.trip_id)
        .bind(&file.file_name)
        .bind(&file.url)
        .bind(&file.content_type)
        .bind(file.size_bytes)
        .bind(&file.uploaded_by)
        .bind(&file.created_at)
        .execute(&mut *tx)
        .await?;
        Self::bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(file)
    }

    /// Delete a place file.
    pub async fn delete_place_file(&self, place_id: &str, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM place_files WHERE id = ? AND place_id = ?")
            .bind(id)
            .bind(place_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("File {} not found", id)));
        }

        Self::bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    // ==================== SHARE OPERATIONS ====================

    /// List the collaborators of a trip.
    pub async fn list_shares(&self, trip_id: &str) -> Result<Vec<Share>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM shares WHERE trip_id = ? ORDER BY created_at, id",
            SHARE_COLUMNS
        ))
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(share_from_row).collect())
    }

    /// Share a trip with another user.
    pub async fn create_share(
        &self,
        trip_id: &str,
        request: &CreateShareRequest,
    ) -> Result<Share, AppError> {
        let share = Share {
            id: uuid::Uuid::new_v4().to_string(),
            trip_id: trip_id.to_string(),
            user_id: request.user_id.clone(),
            role: request.role,
            created_at: Utc::now().to_rfc3339(),
        };

        let mut tx = self.pool.begin().await?;
        let existing = sqlx::query("SELECT id FROM shares WHERE trip_id = ? AND user_id = ?")
            .bind(trip_id)
            .bind(&share.user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(AppError::Validation(format!(
                "Trip {} is already shared with {}",
                trip_id, share.user_id
            )));
        }

        sqlx::query(
            "INSERT INTO shares (id, trip_id, user_id, role, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&share.id)
        .bind(&share.trip_id)
        .bind(&share.user_id)
        .bind(share.role.as_str())
        .bind(&share.created_at)
        .execute(&mut *tx)
        .await?;
        Self::bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(share)
    }

    /// Revoke a share, returning the removed record.
    pub async fn delete_share(&self, trip_id: &str, id: &str) -> Result<Share, AppError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "SELECT {} FROM shares WHERE id = ? AND trip_id = ?",
            SHARE_COLUMNS
        ))
        .bind(id)
        .bind(trip_id)
        .fetch_optional(&mut *tx)
        .await?;
        let share = row
            .as_ref()
            .and_then(share_from_row)
            .ok_or_else(|| AppError::NotFound(format!("Share {} not found", id)))?;

        sqlx::query("DELETE FROM shares WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        Self::bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(share)
    }
}

fn trip_from_row(row: &SqliteRow) -> Trip {
    Trip {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        name: row.get("name"),
        description: row.get("description"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn place_from_row(row: &SqliteRow) -> Place {
    Place {
        id: row.get("id"),
        trip_id: row.get("trip_id"),
        name: row.get("name"),
        address: row.get("address"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        visit_date: row.get("visit_date"),
        visit_time: row.get("visit_time"),
        category: row.get("category"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn accommodation_from_row(row: &SqliteRow) -> Accommodation {
    Accommodation {
        id: row.get("id"),
        trip_id: row.get("trip_id"),
        name: row.get("name"),
        address: row.get("address"),
        check_in: row.get("check_in"),
        check_out: row.get("check_out"),
        confirmation: row.get("confirmation"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn trip_file_from_row(row: &SqliteRow) -> TripFile {
    TripFile {
        id: row.get("id"),
        trip_id: row.get("trip_id"),
        file_name: row.get("file_name"),
        url: row.get("url"),
        content_type: row.get("content_type"),
        size_bytes: row.get("size_bytes"),
        uploaded_by: row.get("uploaded_by"),
        created_at: row.get("created_at"),
    }
}

fn place_file_from_row(row: &SqliteRow) -> PlaceFile {
    PlaceFile {
        id: row.get("id"),
        place_id: row.get("place_id"),
        trip_id: row.get("trip_id"),
        file_name: row.get("file_name"),
        url: row.get("url"),
        content_type: row.get("content_type"),
        size_bytes: row.get("size_bytes"),
        uploaded_by: row.get("uploaded_by"),
        created_at: row.get("created_at"),
    }
}

fn share_from_row(row: &SqliteRow) -> Option<Share> {
    let role: String = row.get("role");
    let Some(role) = ShareRole::parse(&role) else {
        tracing::warn!("Skipping share with unknown role `{}`", role);
        return None;
    };
    Some(Share {
        id: row.get("id"),
        trip_id: row.get("trip_id"),
        user_id: row.get("user_id"),
        role,
        created_at: row.get("created_at"),
    })
}
