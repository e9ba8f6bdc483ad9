// API client module: a small blocking HTTP client for the imaging
// repository's JSON gateway. The session lives in the cookie store and
// every POST carries the CSRF token fetched before login.

use crate::config::ServerConfig;
use crate::model::{FileAnnotation, ImageRef, NamingConvention, OriginalFile, Plate, Screen, Well};
use crate::repository::Repository;
use crate::{Error, Result};
use reqwest::blocking::{multipart, Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs::File;
use std::path::Path;
use std::rc::Rc;

const API_PREFIX: &str = "api/v0";
const PAGE_LIMIT: usize = 200;
const CSRF_HEADER: &str = "x-csrftoken";
const FILE_ANNOTATION_TYPE: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06#FileAnnotation";
const ORIGINAL_FILE_TYPE: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06#OriginalFile";

/// Blocking client holding the session cookies, the gateway base URL and
/// the CSRF token required for write calls.
pub struct ApiClient {
    client: Client,
    base_url: String,
    csrf_token: Option<String>,
}

/// Username and password for the login form.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
struct LoginForm<'a> {
    server: u32,
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize, Debug)]
struct LoginResponse {
    #[serde(default)]
    success: bool,
    #[serde(rename = "eventContext")]
    event_context: Option<EventContext>,
    message: Option<String>,
}

/// Session details returned by a successful login.
#[derive(Deserialize, Debug, Clone)]
pub struct EventContext {
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(rename = "groupName")]
    pub group_name: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Single<T> {
    data: T,
}

#[derive(Deserialize, Debug)]
struct Page<T> {
    data: Vec<T>,
    meta: Option<PageMeta>,
}

#[derive(Deserialize, Debug)]
struct PageMeta {
    #[serde(rename = "totalCount")]
    total_count: Option<usize>,
}

#[derive(Deserialize, Debug)]
struct ScreenDto {
    #[serde(rename = "@id")]
    id: i64,
    #[serde(rename = "Name", default)]
    name: String,
}

#[derive(Deserialize, Debug)]
struct PlateDto {
    #[serde(rename = "@id")]
    id: i64,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "RowNamingConvention")]
    row_naming: Option<NamingConvention>,
    #[serde(rename = "ColumnNamingConvention")]
    column_naming: Option<NamingConvention>,
}

#[derive(Deserialize, Debug)]
struct WellDto {
    #[serde(rename = "@id")]
    id: i64,
    #[serde(rename = "Row")]
    row: usize,
    #[serde(rename = "Column")]
    column: usize,
    #[serde(rename = "WellSamples", default)]
    well_samples: Vec<WellSampleDto>,
}

#[derive(Deserialize, Debug)]
struct WellSampleDto {
    #[serde(rename = "Image")]
    image: Option<ImageDto>,
}

#[derive(Deserialize, Debug)]
struct ImageDto {
    #[serde(rename = "@id")]
    id: i64,
    #[serde(rename = "Name")]
    name: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OriginalFileDto {
    #[serde(rename = "@id")]
    id: i64,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Path", default)]
    path: String,
    #[serde(rename = "Mimetype", default)]
    mimetype: String,
}

#[derive(Deserialize, Debug)]
struct IdRef {
    #[serde(rename = "@id")]
    id: i64,
}

#[derive(Deserialize, Debug)]
struct FileAnnotationDto {
    #[serde(rename = "@id")]
    id: i64,
    #[serde(rename = "Namespace")]
    namespace: Option<String>,
    #[serde(rename = "File")]
    file: Option<IdRef>,
}

impl From<ScreenDto> for Screen {
    fn from(dto: ScreenDto) -> Self {
        Screen { id: dto.id, name: dto.name }
    }
}

impl From<PlateDto> for Plate {
    fn from(dto: PlateDto) -> Self {
        Plate {
            id: dto.id,
            name: dto.name,
            row_naming: dto.row_naming.unwrap_or(NamingConvention::Letter),
            column_naming: dto.column_naming.unwrap_or(NamingConvention::Number),
        }
    }
}

impl WellDto {
    fn into_well(self, plate: &Rc<Plate>) -> Well {
        let images = self
            .well_samples
            .into_iter()
            .map(|ws| ws.image.map(|img| ImageRef { id: img.id, name: img.name }))
            .collect();
        Well {
            id: self.id,
            row: self.row,
            column: self.column,
            images,
            plate: Rc::clone(plate),
        }
    }
}

impl From<OriginalFileDto> for OriginalFile {
    fn from(dto: OriginalFileDto) -> Self {
        OriginalFile {
            id: dto.id,
            name: dto.name,
            path: dto.path,
            mimetype: dto.mimetype,
        }
    }
}

/// Whether another page should be requested after collecting `collected`
/// items, the last page having held `fetched` of them.
fn has_more(fetched: usize, collected: usize, total: Option<usize>) -> bool {
    match total {
        Some(total) => fetched > 0 && collected < total,
        None => fetched == PAGE_LIMIT,
    }
}

/// Turn a non-success response into `Error::Api`, keeping the body text.
fn check(operation: &'static str, res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().unwrap_or_default();
    Err(Error::Api { operation, status, body })
}

impl ApiClient {
    /// Build an unauthenticated client for the gateway at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().cookie_store(true).build()?;
        Ok(ApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            csrf_token: None,
        })
    }

    /// Create a client and log in with the given credentials.
    pub fn connect(server: &ServerConfig, credentials: &Credentials) -> Result<Self> {
        let mut api = ApiClient::new(&server.url)?;
        let ctx = api.login(server.server_id, credentials)?;
        log::info!(
            "Logged in to {} as {}{}",
            api.base_url,
            ctx.user_name,
            ctx.group_name
                .as_ref()
                .map(|g| format!(" (group {})", g))
                .unwrap_or_default()
        );
        Ok(api)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, path.trim_start_matches('/'))
    }

    /// Headers every write call needs once the CSRF token is known.
    fn write_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.csrf_token {
            let value = HeaderValue::from_str(token)
                .map_err(|_| Error::Protocol("CSRF token is not a valid header value".into()))?;
            headers.insert(CSRF_HEADER, value);
        }
        if let Ok(referer) = HeaderValue::from_str(&self.base_url) {
            headers.insert(REFERER, referer);
        }
        Ok(headers)
    }

    fn fetch_csrf_token(&mut self) -> Result<()> {
        let res = self.client.get(self.url("token/")).send()?;
        let token: Single<String> = check("CSRF token request", res)?.json()?;
        self.csrf_token = Some(token.data);
        Ok(())
    }

    /// Perform login and keep the session cookie for later calls.
    pub fn login(&mut self, server_id: u32, credentials: &Credentials) -> Result<EventContext> {
        self.fetch_csrf_token()?;
        let form = LoginForm {
            server: server_id,
            username: &credentials.username,
            password: &credentials.password,
        };
        let res = self
            .client
            .post(self.url("login/"))
            .headers(self.write_headers()?)
            .form(&form)
            .send()?;
        let status = res.status();
        let body = res.text()?;
        // Rejections may be HTML pages.
        match serde_json::from_str::<LoginResponse>(&body).ok() {
            Some(LoginResponse { success: true, event_context: Some(ctx), .. })
                if status.is_success() =>
            {
                Ok(ctx)
            }
            Some(LoginResponse { message: Some(message), .. }) => Err(Error::Auth(message)),
            _ => Err(Error::Auth(format!("gateway answered {}", status))),
        }
    }

    fn get_all<T: DeserializeOwned>(&self, path: &str, operation: &'static str) -> Result<Vec<T>> {
        let mut items: Vec<T> = Vec::new();
        loop {
            let res = self
                .client
                .get(self.url(path))
                .query(&[("offset", items.len()), ("limit", PAGE_LIMIT)])
                .send()?;
            let page: Page<T> = check(operation, res)?.json()?;
            let fetched = page.data.len();
            items.extend(page.data);
            let total = page.meta.and_then(|m| m.total_count);
            if !has_more(fetched, items.len(), total) {
                break;
            }
        }
        log::debug!("{} returned {} objects", operation, items.len());
        Ok(items)
    }
}

impl Repository for ApiClient {
    fn find_screen(&self, name: &str) -> Result<Screen> {
        let screens: Vec<ScreenDto> = self.get_all("m/screens/", "Screen listing")?;
        screens
            .into_iter()
            .find(|s| s.name == name)
            .map(Screen::from)
            .ok_or_else(|| Error::ScreenNotFound(name.to_string()))
    }

    fn list_plates(&self, screen: &Screen) -> Result<Vec<Plate>> {
        let path = format!("m/screens/{}/plates/", screen.id);
        let plates: Vec<PlateDto> = self.get_all(&path, "Plate listing")?;
        Ok(plates.into_iter().map(Plate::from).collect())
    }

    fn list_wells(&self, plate: &Plate) -> Result<Vec<Well>> {
        let path = format!("m/plates/{}/wells/", plate.id);
        let wells: Vec<WellDto> = self.get_all(&path, "Well listing")?;
        let parent = Rc::new(plate.clone());
        Ok(wells.into_iter().map(|w| w.into_well(&parent)).collect())
    }

    fn upload_file(&self, path: &Path, dir: &str, mimetype: &str) -> Result<OriginalFile> {
        let file = File::open(path)?;
        let length = file.metadata()?.len();
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("mask.png")
            .to_string();

        let part = multipart::Part::reader_with_length(file, length)
            .file_name(file_name)
            .mime_str(mimetype)?;
        let form = multipart::Form::new()
            .text("dir", dir.to_string())
            .text("mimetype", mimetype.to_string())
            .part("file", part);

        let res = self
            .client
            .post(self.url("m/originalfiles/"))
            .headers(self.write_headers()?)
            .multipart(form)
            .send()?;
        let created: Single<OriginalFileDto> = check("Upload", res)?.json()?;
        Ok(created.data.into())
    }

    fn create_file_annotation(
        &self,
        file: &OriginalFile,
        namespace: &str,
    ) -> Result<FileAnnotation> {
        let body = json!({
            "@type": FILE_ANNOTATION_TYPE,
            "Namespace": namespace,
            "File": { "@id": file.id, "@type": ORIGINAL_FILE_TYPE },
        });
        let res = self
            .client
            .post(self.url("m/save/"))
            .headers(self.write_headers()?)
            .json(&body)
            .send()?;
        let saved: Single<FileAnnotationDto> = check("Annotation save", res)?.json()?;
        Ok(FileAnnotation {
            id: saved.data.id,
            namespace: saved.data.namespace.unwrap_or_else(|| namespace.to_string()),
            file_id: saved.data.file.map(|f| f.id).unwrap_or(file.id),
        })
    }

    fn link_annotation(&self, image: &ImageRef, annotation: &FileAnnotation) -> Result<()> {
        let path = format!("m/images/{}/annotations/", image.id);
        let res = self
            .client
            .post(self.url(&path))
            .headers(self.write_headers()?)
            .json(&json!({ "@id": annotation.id }))
            .send()?;
        check("Annotation link", res)?;
        Ok(())
    }
}
