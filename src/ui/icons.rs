pub struct Icons;

impl Icons {
    pub const ROSTER: &str = "📋";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const COMPANY: &str = "🏢";
    pub const STUDENT: &str = "🎓";
    pub const DATABASE: &str = "🗄️";
    pub const DEL: &str = "🗑️";
    pub const WRENCH: &str = "🔧";
}
