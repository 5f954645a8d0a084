use schemars::JsonSchema;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash,
            PartialOrd, Ord,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}
id_newtype!(ProfessorId);
id_newtype!(ClassroomId);
id_newtype!(CurricularUnitId);
id_newtype!(SectionId);
id_newtype!(PlacementId);

/// Local ids handed out to placements that the backend has not seen yet.
pub const LOCAL_ID_PREFIX: &str = "local-";

impl PlacementId {
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }
}

/// Packed wall-clock time, `hours * 100 + minutes`. Exchanged as `"HH:MM"`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, ToSchema, JsonSchema)]
#[schema(value_type = String, example = "07:45")]
pub struct Hhmm(#[schemars(with = "String")] pub u16);

impl Hhmm {
    pub const fn new(hour: u16, minute: u16) -> Self {
        Self(hour * 100 + minute)
    }

    pub fn hour(self) -> u16 {
        self.0 / 100
    }

    pub fn minute(self) -> u16 {
        self.0 % 100
    }

    pub fn is_valid(self) -> bool {
        self.hour() < 24 && self.minute() < 60
    }
}

impl fmt::Display for Hhmm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseHhmmError(pub String);

impl fmt::Display for ParseHhmmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid time of day: {:?}", self.0)
    }
}

impl std::error::Error for ParseHhmmError {}

impl FromStr for Hhmm {
    type Err = ParseHhmmError;

    // "HH:MM" or "HH:MM:SS"; seconds are dropped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseHhmmError(s.to_string());
        let mut parts = s.trim().split(':');
        let hour: u16 = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        let minute: u16 = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        if let Some(sec) = parts.next() {
            sec.parse::<u16>().map_err(|_| err())?;
        }
        if parts.next().is_some() {
            return Err(err());
        }
        if hour >= 24 || minute >= 60 {
            return Err(err());
        }
        Ok(Hhmm::new(hour, minute))
    }
}

impl Serialize for Hhmm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hhmm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Lunes,
    Martes,
    Miercoles,
    Jueves,
    Viernes,
    Sabado,
}

impl Weekday {
    pub const ALL: [Weekday; 6] = [
        Weekday::Lunes,
        Weekday::Martes,
        Weekday::Miercoles,
        Weekday::Jueves,
        Weekday::Viernes,
        Weekday::Sabado,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<Weekday> {
        Self::ALL.get(i).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Weekday::Lunes => "lunes",
            Weekday::Martes => "martes",
            Weekday::Miercoles => "miercoles",
            Weekday::Jueves => "jueves",
            Weekday::Viernes => "viernes",
            Weekday::Sabado => "sabado",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Turno {
    #[serde(alias = "mañana")]
    Manana,
    Tarde,
    Noche,
}

/// Which resource a grid belongs to. Section, professor and classroom views
/// share one engine and differ only in this tag.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum GridOwner {
    Section(SectionId),
    Professor(ProfessorId),
    Classroom(ClassroomId),
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
pub struct Conflict {
    pub r#type: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassPlacement {
    pub id: PlacementId,
    pub professor_id: ProfessorId,
    pub classroom_id: ClassroomId,
    pub curricular_unit_id: CurricularUnitId,
    pub day_index: usize,
    pub start_time: Hhmm,
    pub end_time: Hhmm,
    pub required_blocks: u32,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub is_moved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<Conflict>>,
}

impl ClassPlacement {
    pub fn is_dirty(&self) -> bool {
        self.is_new || self.is_moved
    }
}

/// One grid cell of a placement run. `block_index == 0` is the head cell.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CellState {
    pub class_data: ClassPlacement,
    pub block_index: u32,
    pub block_span: u32,
}

impl CellState {
    pub fn is_head(&self) -> bool {
        self.block_index == 0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub day_index: usize,
    pub start_block: Hhmm,
    pub end_block: Hhmm,
    pub blocks: Vec<Hhmm>,
    pub required_blocks: u32,
}

/// A class waiting for a slot: brand new when `id` is absent.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassRequest {
    #[serde(default)]
    pub id: Option<PlacementId>,
    pub professor_id: ProfessorId,
    pub classroom_id: ClassroomId,
    pub curricular_unit_id: CurricularUnitId,
    #[serde(default)]
    pub required_blocks: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityWindow {
    pub day_of_week: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookedClass {
    pub schedule_id: PlacementId,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceBooking {
    pub day_of_week: String,
    #[serde(default)]
    pub classes: Vec<BookedClass>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RawClass {
    pub id: PlacementId,
    pub professor_id: ProfessorId,
    pub classroom_id: ClassroomId,
    pub curricular_unit_id: CurricularUnitId,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RawDay {
    pub day_name: String,
    #[serde(default)]
    pub classes: Vec<RawClass>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SectionSchedule {
    #[serde(default)]
    pub days: Vec<RawDay>,
    #[serde(default)]
    pub turno: Option<Turno>,
}

/// Body of create/update calls. Conflicts never travel back to the backend.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlacementPayload {
    pub professor_id: ProfessorId,
    pub classroom_id: ClassroomId,
    pub curricular_unit_id: CurricularUnitId,
    pub day_of_week: Weekday,
    pub start_time: Hhmm,
    pub end_time: Hhmm,
    pub required_blocks: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(default)]
    pub id: Option<PlacementId>,
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct DeleteResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hhmm_parses_both_wire_forms() {
        assert_eq!("07:45".parse::<Hhmm>().unwrap(), Hhmm(745));
        assert_eq!("13:00:00".parse::<Hhmm>().unwrap(), Hhmm(1300));
        assert_eq!("7:05".parse::<Hhmm>().unwrap(), Hhmm(705));
    }

    #[test]
    fn hhmm_rejects_garbage() {
        for s in ["", "ab:cd", "24:00", "12:60", "12", "1:2:3:4", "12:xx:00"] {
            assert!(s.parse::<Hhmm>().is_err(), "{s} should not parse");
        }
    }

    #[test]
    fn hhmm_serializes_as_string() {
        let json = serde_json::to_string(&Hhmm(830)).unwrap();
        assert_eq!(json, "\"08:30\"");
        let back: Hhmm = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Hhmm(830));
    }

    #[test]
    fn placement_uses_camel_case_and_hides_empty_conflicts() {
        let p = ClassPlacement {
            id: "42".into(),
            professor_id: "p1".into(),
            classroom_id: "r1".into(),
            curricular_unit_id: "uc1".into(),
            day_index: 0,
            start_time: Hhmm(700),
            end_time: Hhmm(830),
            required_blocks: 2,
            is_new: false,
            is_moved: true,
            conflicts: None,
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["professorId"], "p1");
        assert_eq!(v["isMoved"], true);
        assert!(v.get("conflicts").is_none());
    }

    #[test]
    fn local_ids_are_recognized() {
        assert!(PlacementId(format!("{LOCAL_ID_PREFIX}abc")).is_local());
        assert!(!PlacementId::from("17").is_local());
    }

    #[test]
    fn grid_owner_is_tagged() {
        let v = serde_json::to_value(GridOwner::Classroom("A-101".into())).unwrap();
        assert_eq!(v, serde_json::json!({"kind": "classroom", "id": "A-101"}));
    }
}
