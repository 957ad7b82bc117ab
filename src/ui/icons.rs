pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const SEARCH: &str = "🔍";
    pub const CHECK: &str = "✅";
    pub const WARN: &str = "⚠️";
    pub const STATS: &str = "📊";
    pub const CLASS: &str = "☕";
    pub const JAR: &str = "🫙";
    pub const DATABASE: &str = "🗄️";
    pub const FOLDER: &str = "📂";
    pub const NEW: &str = "✨";
    pub const MOD: &str = "📝";
}
