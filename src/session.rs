pub const PROFILE_ID: &str = "profile_id";
pub const RETURN_URL: &str = "return_url";
