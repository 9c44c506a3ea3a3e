use crate::search::Searchable;
use crate::store::{list_from_row, list_to_value, MasterRecord, StoreError, StoreResult};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Management,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Management => "management",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            "management" => Some(Role::Management),
            _ => None,
        }
    }

    /// Landing route for a signed-in user of this role.
    pub fn dashboard_route(self) -> String {
        format!("/{}-dashboard", self.as_str())
    }
}

fn role_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<Role> {
    let raw: String = row.get(idx)?;
    Role::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown role {raw:?}").into(),
        )
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub department: String,
    #[serde(default)]
    pub timestamp: String,
}

impl Searchable for User {
    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.username.as_str(),
            self.email.as_str(),
            self.department.as_str(),
            self.role.as_str(),
        ]
    }
}

impl MasterRecord for User {
    const COLLECTION: &'static str = "users";
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] =
        &["username", "email", "role", "department", "timestamp"];
    const REQUIRED: &'static [&'static str] = &["username", "email", "role", "department"];
    const ORDER_BY: &'static str = "username";

    fn id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: String) {
        self.id = id;
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            role: role_from_row(row, 3)?,
            department: row.get(4)?,
            timestamp: row.get(5)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.username.clone()),
            Value::Text(self.email.clone()),
            Value::Text(self.role.as_str().to_string()),
            Value::Text(self.department.clone()),
            Value::Text(self.timestamp.clone()),
        ]
    }

    fn normalize(&mut self) -> StoreResult<()> {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_ascii_lowercase();
        self.department = self.department.trim().to_string();
        if !self.email.contains('@') {
            return Err(StoreError::invalid("email", "must be an email address"));
        }
        if self.timestamp.is_empty() {
            self.timestamp = chrono::Utc::now().to_rfc3339();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstitutionType {
    School,
    College,
    Coaching,
    Tutor,
    Internet,
    #[serde(rename = "Book Store")]
    BookStore,
}

impl InstitutionType {
    pub fn as_str(self) -> &'static str {
        match self {
            InstitutionType::School => "School",
            InstitutionType::College => "College",
            InstitutionType::Coaching => "Coaching",
            InstitutionType::Tutor => "Tutor",
            InstitutionType::Internet => "Internet",
            InstitutionType::BookStore => "Book Store",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "School" => Some(InstitutionType::School),
            "College" => Some(InstitutionType::College),
            "Coaching" => Some(InstitutionType::Coaching),
            "Tutor" => Some(InstitutionType::Tutor),
            "Internet" => Some(InstitutionType::Internet),
            "Book Store" => Some(InstitutionType::BookStore),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Institution {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub code: String,
    pub address: String,
    pub contact: String,
    #[serde(rename = "type")]
    pub kind: InstitutionType,
}

impl Searchable for Institution {
    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.name.as_str(),
            self.code.as_str(),
            self.address.as_str(),
            self.kind.as_str(),
        ]
    }
}

impl MasterRecord for Institution {
    const COLLECTION: &'static str = "institutions";
    const TABLE: &'static str = "institutions";
    const COLUMNS: &'static [&'static str] = &["name", "code", "address", "contact", "type"];
    const REQUIRED: &'static [&'static str] = &["name", "code", "address", "contact", "type"];
    const ORDER_BY: &'static str = "name";

    fn id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: String) {
        self.id = id;
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let kind: String = row.get(5)?;
        Ok(Institution {
            id: row.get(0)?,
            name: row.get(1)?,
            code: row.get(2)?,
            address: row.get(3)?,
            contact: row.get(4)?,
            kind: InstitutionType::parse(&kind).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    rusqlite::types::Type::Text,
                    format!("unknown institution type {kind:?}").into(),
                )
            })?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.clone()),
            Value::Text(self.code.clone()),
            Value::Text(self.address.clone()),
            Value::Text(self.contact.clone()),
            Value::Text(self.kind.as_str().to_string()),
        ]
    }

    fn normalize(&mut self) -> StoreResult<()> {
        self.name = self.name.trim().to_string();
        self.code = self.code.trim().to_string();
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub institution_ids: Vec<String>,
}

impl Searchable for Location {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str()]
    }
}

impl MasterRecord for Location {
    const COLLECTION: &'static str = "locations";
    const TABLE: &'static str = "locations";
    const COLUMNS: &'static [&'static str] = &["name", "institution_ids"];
    const REQUIRED: &'static [&'static str] = &["name"];
    const ORDER_BY: &'static str = "name";

    fn id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: String) {
        self.id = id;
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Location {
            id: row.get(0)?,
            name: row.get(1)?,
            institution_ids: list_from_row(row, 2)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.clone()),
            list_to_value(&self.institution_ids),
        ]
    }

    fn normalize(&mut self) -> StoreResult<()> {
        self.name = self.name.trim().to_string();
        Ok(())
    }
}

/// A region inside a [`Location`]. The parent link is a plain id; nothing
/// keeps it pointing at an existing location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubLocation {
    #[serde(default)]
    pub id: String,
    pub location_id: String,
    pub name: String,
    #[serde(default)]
    pub institution_id: Option<String>,
}

impl Searchable for SubLocation {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str()]
    }
}

impl MasterRecord for SubLocation {
    const COLLECTION: &'static str = "subLocations";
    const TABLE: &'static str = "sub_locations";
    const COLUMNS: &'static [&'static str] = &["location_id", "name", "institution_id"];
    const REQUIRED: &'static [&'static str] = &["locationId", "name"];
    const ORDER_BY: &'static str = "name";

    fn id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: String) {
        self.id = id;
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(SubLocation {
            id: row.get(0)?,
            location_id: row.get(1)?,
            name: row.get(2)?,
            institution_id: row.get(3)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.location_id.clone()),
            Value::Text(self.name.clone()),
            match &self.institution_id {
                Some(v) => Value::Text(v.clone()),
                None => Value::Null,
            },
        ]
    }

    fn normalize(&mut self) -> StoreResult<()> {
        self.name = self.name.trim().to_string();
        if self.institution_id.as_deref().map(str::trim) == Some("") {
            self.institution_id = None;
        }
        Ok(())
    }
}

fn board_kind() -> String {
    "board".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub institution_ids: Vec<String>,
    #[serde(rename = "type", default = "board_kind")]
    pub kind: String,
}

impl Searchable for Board {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str()]
    }
}

impl MasterRecord for Board {
    const COLLECTION: &'static str = "boards";
    const TABLE: &'static str = "boards";
    const COLUMNS: &'static [&'static str] = &["name", "institution_ids", "type"];
    const REQUIRED: &'static [&'static str] = &["name"];
    const ORDER_BY: &'static str = "name";

    fn id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: String) {
        self.id = id;
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Board {
            id: row.get(0)?,
            name: row.get(1)?,
            institution_ids: list_from_row(row, 2)?,
            kind: row.get(3)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.clone()),
            list_to_value(&self.institution_ids),
            Value::Text(self.kind.clone()),
        ]
    }

    fn normalize(&mut self) -> StoreResult<()> {
        self.name = self.name.trim().to_string();
        self.kind = board_kind();
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Designation {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

impl Searchable for Designation {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str()]
    }
}

impl MasterRecord for Designation {
    const COLLECTION: &'static str = "designations";
    const TABLE: &'static str = "designations";
    const COLUMNS: &'static [&'static str] = &["name"];
    const REQUIRED: &'static [&'static str] = &["name"];
    const ORDER_BY: &'static str = "name";

    fn id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: String) {
        self.id = id;
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Designation {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone())]
    }

    fn normalize(&mut self) -> StoreResult<()> {
        self.name = self.name.trim().to_string();
        Ok(())
    }
}

/// Academic session. Several may be active at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicSession {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub institution_ids: Vec<String>,
}

impl Searchable for AcademicSession {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str()]
    }
}

impl MasterRecord for AcademicSession {
    const COLLECTION: &'static str = "sessions";
    const TABLE: &'static str = "sessions";
    const COLUMNS: &'static [&'static str] = &["name", "is_active", "institution_ids"];
    const REQUIRED: &'static [&'static str] = &["name"];
    const ORDER_BY: &'static str = "name";

    fn id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: String) {
        self.id = id;
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(AcademicSession {
            id: row.get(0)?,
            name: row.get(1)?,
            is_active: row.get::<_, i64>(2)? != 0,
            institution_ids: list_from_row(row, 3)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.clone()),
            Value::Integer(self.is_active as i64),
            list_to_value(&self.institution_ids),
        ]
    }

    fn normalize(&mut self) -> StoreResult<()> {
        self.name = self.name.trim().to_string();
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    #[serde(default)]
    pub id: String,
    pub stream_name: String,
    pub stream_code: String,
    #[serde(default)]
    pub description: String,
}

impl Searchable for Stream {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.stream_name.as_str(), self.stream_code.as_str()]
    }
}

impl MasterRecord for Stream {
    const COLLECTION: &'static str = "streams";
    const TABLE: &'static str = "streams";
    const COLUMNS: &'static [&'static str] = &["stream_name", "stream_code", "description"];
    const REQUIRED: &'static [&'static str] = &["streamName", "streamCode"];
    const ORDER_BY: &'static str = "stream_name";

    fn id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: String) {
        self.id = id;
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Stream {
            id: row.get(0)?,
            stream_name: row.get(1)?,
            stream_code: row.get(2)?,
            description: row.get(3)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.stream_name.clone()),
            Value::Text(self.stream_code.clone()),
            Value::Text(self.description.clone()),
        ]
    }
}

/// Staff member. `designation`, `stream` and `location` hold display names,
/// not ids, and may name values that no longer exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    #[serde(default)]
    pub id: String,
    pub staff_name: String,
    pub designation: String,
    pub stream: String,
    pub location: String,
    pub employment_status: String,
}

impl Searchable for Staff {
    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.staff_name.as_str(),
            self.designation.as_str(),
            self.stream.as_str(),
            self.location.as_str(),
        ]
    }
}

impl MasterRecord for Staff {
    const COLLECTION: &'static str = "staff";
    const TABLE: &'static str = "staff";
    const COLUMNS: &'static [&'static str] = &[
        "staff_name",
        "designation",
        "stream",
        "location",
        "employment_status",
    ];
    const REQUIRED: &'static [&'static str] = &[
        "staffName",
        "designation",
        "stream",
        "location",
        "employmentStatus",
    ];
    const ORDER_BY: &'static str = "staff_name";

    fn id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: String) {
        self.id = id;
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Staff {
            id: row.get(0)?,
            staff_name: row.get(1)?,
            designation: row.get(2)?,
            stream: row.get(3)?,
            location: row.get(4)?,
            employment_status: row.get(5)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.staff_name.clone()),
            Value::Text(self.designation.clone()),
            Value::Text(self.stream.clone()),
            Value::Text(self.location.clone()),
            Value::Text(self.employment_status.clone()),
        ]
    }

    fn normalize(&mut self) -> StoreResult<()> {
        self.staff_name = self.staff_name.trim().to_string();
        Ok(())
    }
}

/// One row of an uploaded school roster. `sn` and `uid` are assigned by the
/// upload, never by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolRow {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub sn: i64,
    pub board: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub sub_location: String,
    pub school_name: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Searchable for SchoolRow {
    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.school_name.as_str(),
            self.uid.as_str(),
            self.board.as_str(),
            self.location.as_str(),
            self.sub_location.as_str(),
        ]
    }
}

impl MasterRecord for SchoolRow {
    const COLLECTION: &'static str = "schoolData";
    const TABLE: &'static str = "school_data";
    const COLUMNS: &'static [&'static str] = &[
        "sn",
        "board",
        "board_key",
        "location",
        "sub_location",
        "school_name",
        "uid",
        "created_at",
    ];
    const REQUIRED: &'static [&'static str] = &["board", "schoolName"];
    const ORDER_BY: &'static str = "sn, board";

    fn id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: String) {
        self.id = id;
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(SchoolRow {
            id: row.get(0)?,
            sn: row.get(1)?,
            board: row.get(2)?,
            location: row.get(4)?,
            sub_location: row.get(5)?,
            school_name: row.get(6)?,
            uid: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.sn),
            Value::Text(self.board.clone()),
            Value::Text(crate::uid::board_key(&self.board)),
            Value::Text(self.location.clone()),
            Value::Text(self.sub_location.clone()),
            Value::Text(self.school_name.clone()),
            Value::Text(self.uid.clone()),
            match &self.created_at {
                Some(v) => Value::Text(v.clone()),
                None => Value::Null,
            },
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchoolDetails {
    pub school_name: String,
    pub school_address: String,
    pub date: String,
    pub no_of_students: u32,
    pub topic_covered: String,
    pub visit_remark: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrincipalInfo {
    pub name: String,
    pub contact_no: String,
    pub dob: String,
    pub doa: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Teacher {
    pub name: String,
    pub subject: String,
    pub contact_no: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrengthCount {
    pub in12: u32,
    pub coaching: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Strengths {
    pub pcm: StrengthCount,
    pub pcb: StrengthCount,
    pub commerce: StrengthCount,
    pub humanities: StrengthCount,
    pub other: StrengthCount,
}

impl Strengths {
    pub fn rows(&self) -> [(&'static str, StrengthCount); 5] {
        [
            ("PCM", self.pcm),
            ("PCB", self.pcb),
            ("Commerce", self.commerce),
            ("Humanities", self.humanities),
            ("Other", self.other),
        ]
    }
}

/// School-visit report submitted from the data-entry portal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataForm {
    pub id: String,
    pub user_id: String,
    pub school_details: SchoolDetails,
    pub principal_info: PrincipalInfo,
    pub graduation_teachers: Vec<Teacher>,
    pub pgt_teachers: Vec<Teacher>,
    pub strengths: Strengths,
    pub document_urls: Vec<String>,
    pub selected_region: String,
    pub selected_board: String,
    pub submitted_at: String,
}
