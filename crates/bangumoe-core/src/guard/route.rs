//! The page set the guard knows about.

use super::Location;

/// Suffix shared by every page title
pub const SITE_TITLE: &str = "咪次元~Bangumoe！";

/// Query key carrying the post-login return target
pub const REDIRECT_QUERY: &str = "redirect";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    About,
    Catalogue,
    CatalogueByYear { year: String },
    Login,
    Register,
    UserSpace,
    Rankings,
    Player { id: String },
    PlayerV2 { id: String },
    NoAccess,
    Search,
    Privacy,
    Terms,
    NotFound,
}

impl Route {
    /// Match a path (query ignored) against the route table.
    pub fn resolve(path: &str) -> Self {
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Route::Home,
            ["about"] => Route::About,
            ["anime"] => Route::Catalogue,
            ["anime", "year", year] => Route::CatalogueByYear {
                year: (*year).to_string(),
            },
            ["login"] => Route::Login,
            ["register"] => Route::Register,
            ["user", "profile"] => Route::UserSpace,
            ["rankings"] => Route::Rankings,
            ["bangumi", id] => Route::Player {
                id: (*id).to_string(),
            },
            ["v2", "bangumi", id] => Route::PlayerV2 {
                id: (*id).to_string(),
            },
            ["no-beta-access"] => Route::NoAccess,
            ["search"] => Route::Search,
            ["privacy"] => Route::Privacy,
            ["terms"] => Route::Terms,
            _ => Route::NotFound,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Route::Home => "home",
            Route::About => "about",
            Route::Catalogue => "anime",
            Route::CatalogueByYear { .. } => "anime-detail",
            Route::Login => "login",
            Route::Register => "register",
            Route::UserSpace => "user-profile",
            Route::Rankings => "rankings",
            Route::Player { .. } => "bangumi-player",
            Route::PlayerV2 { .. } => "bangumi-player-v2",
            Route::NoAccess => "no-beta-access",
            Route::Search => "search",
            Route::Privacy => "privacy",
            Route::Terms => "terms",
            Route::NotFound => "not-found",
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::About => "/about".to_string(),
            Route::Catalogue => "/anime".to_string(),
            Route::CatalogueByYear { year } => format!("/anime/year/{}", year),
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::UserSpace => "/user/profile".to_string(),
            Route::Rankings => "/rankings".to_string(),
            Route::Player { id } => format!("/bangumi/{}", id),
            Route::PlayerV2 { id } => format!("/v2/bangumi/{}", id),
            Route::NoAccess => "/no-beta-access".to_string(),
            Route::Search => "/search".to_string(),
            Route::Privacy => "/privacy".to_string(),
            Route::Terms => "/terms".to_string(),
            Route::NotFound => "/404".to_string(),
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.path())
    }

    pub fn requires_auth(&self) -> bool {
        matches!(self, Route::UserSpace)
    }

    /// Pages reachable during beta mode without being on the allow-list.
    pub fn is_beta_exempt(&self) -> bool {
        matches!(
            self,
            Route::Login | Route::Register | Route::Privacy | Route::Terms
        )
    }

    pub fn title(&self) -> String {
        let page = match self {
            Route::Home => "首页",
            Route::About => "关于我们",
            Route::Catalogue => "番剧列表",
            Route::CatalogueByYear { .. } => "番剧详情",
            Route::Login => "登录",
            Route::Register => "注册",
            Route::UserSpace => "用户中心",
            Route::Rankings => "番剧排行榜",
            Route::Player { .. } => "番剧播放",
            Route::PlayerV2 { .. } => "番剧播放V2",
            Route::Search => "搜索结果",
            Route::Privacy => "隐私政策",
            Route::Terms => "服务条款",
            Route::NoAccess | Route::NotFound => return SITE_TITLE.to_string(),
        };
        format!("{}   |   {}", page, SITE_TITLE)
    }
}

/// Where to send the user once their session has expired while on `current`.
/// `None` when they are already on the login or register page. The current
/// location is kept as the return target unless it is the bare root.
pub fn login_redirect(current: &Location) -> Option<Location> {
    if matches!(Route::resolve(&current.path), Route::Login | Route::Register) {
        return None;
    }
    let login = Route::Login.location();
    let full_path = current.full_path();
    if full_path == "/" {
        Some(login)
    } else {
        Some(login.with_query(REDIRECT_QUERY, full_path))
    }
}
