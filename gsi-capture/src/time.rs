use time::macros::format_description;
use time::OffsetDateTime;

pub trait TimeSource {
    /// Wall clock for log lines, `2024-05-01 18:03:11.250`
    fn current_time(&self) -> String;
}

#[derive(Clone)]
pub struct SystemTime {}

impl TimeSource for SystemTime {
    fn current_time(&self) -> String {
        let format =
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");
        OffsetDateTime::now_utc()
            .format(&format)
            .unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct FixedTime {
    pub time: String,
}

impl TimeSource for FixedTime {
    fn current_time(&self) -> String {
        self.time.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_time_format() {
        let now = SystemTime {}.current_time();
        assert_eq!(now.len(), "2024-05-01 18:03:11.250".len());
        assert_eq!(&now[10..11], " ");
        assert_eq!(&now[19..20], ".");
    }
}
