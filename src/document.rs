//! Document handle.
//!
//! A [`Document`] owns one object store, the cached page tree and the font
//! registry behind a single lock. Every operation, reads included, runs with
//! that lock held, so a handle can be shared between threads but edits are
//! never interleaved.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::{OpenOptions, SaveOptions};
use crate::content::{self, Device};
use crate::decoders::{probe_jpeg, DecodedStream};
use crate::encryption::{Permissions, SecurityHandler};
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef, Stream};
use crate::page_tree::{Page, PageTree};
use crate::resources::FontRegistry;
use crate::source::{ByteSource, FileSource};
use crate::store::ObjectStore;
use crate::writer::write_document;
use crate::xref::{self, XRefEntry, XRefLoad};
use crate::{dict, xref_reconstruction};

/// Version written for documents created in memory.
const NEW_DOCUMENT_VERSION: (u8, u8) = (1, 7);

/// Everything guarded by the document lock.
struct DocumentState {
    store: ObjectStore,
    version: (u8, u8),
    pages: Option<PageTree>,
    fonts: FontRegistry,
}

impl DocumentState {
    /// Run `f` against the page tree, loading it from the catalog first if
    /// it is not cached.
    fn with_tree<T>(&mut self, f: impl FnOnce(&mut PageTree, &mut ObjectStore) -> Result<T>) -> Result<T> {
        let tree = match self.pages.take() {
            Some(tree) => tree,
            None => {
                let root = pages_root(&mut self.store)?;
                PageTree::load(&mut self.store, root)?
            },
        };
        let tree = self.pages.insert(tree);
        f(tree, &mut self.store)
    }
}

/// An open document.
///
/// # Example
///
/// ```no_run
/// use pdf_engine::Document;
///
/// let doc = Document::open_file("sample.pdf")?;
/// println!("PDF {}.{}, {} pages", doc.version().0, doc.version().1, doc.page_count()?);
/// # Ok::<(), pdf_engine::Error>(())
/// ```
pub struct Document {
    state: Mutex<DocumentState>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Document")
            .field("version", &state.version)
            .field("store", &state.store)
            .finish()
    }
}

impl Document {
    /// Open a document with default options.
    ///
    /// When the document is encrypted, `password` is tried as the user and
    /// then the owner password; without one the empty password is tried.
    /// A failed check still opens the document, see [`Document::is_authenticated`].
    pub fn open<S: ByteSource + 'static>(source: S, password: Option<&[u8]>) -> Result<Self> {
        Self::open_with(Box::new(source), password, OpenOptions::default(), FontRegistry::new())
    }

    /// Open a file on disk with default options and no password.
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(FileSource::open(path)?, None)
    }

    /// Open with explicit options and font registry.
    pub fn open_with(
        mut source: Box<dyn ByteSource>,
        password: Option<&[u8]>,
        options: OpenOptions,
        fonts: FontRegistry,
    ) -> Result<Self> {
        let size = source.len();
        if size > options.max_file_size {
            return Err(Error::FileTooLarge {
                size,
                limit: options.max_file_size,
            });
        }
        let (major, minor, _) = xref::find_header(source.as_mut())?;
        let mut store = load_store(source, &options)?;

        if let Some(encrypt) = store.trailer().get("Encrypt").cloned() {
            init_security(&mut store, &encrypt, password)?;
        }

        log::info!(
            "Opened PDF {}.{} with {} objects",
            major,
            minor,
            store.object_count()
        );
        Ok(Self::from_state(DocumentState {
            store,
            version: (major, minor),
            pages: None,
            fonts,
        }))
    }

    /// Empty document: a catalog and a page tree with no pages.
    pub fn new() -> Self {
        Self::with_options(OpenOptions::default(), FontRegistry::new())
    }

    /// Empty document with explicit options and font registry.
    pub fn with_options(options: OpenOptions, fonts: FontRegistry) -> Self {
        let mut store = ObjectStore::empty(options);
        let pages = store.add_object(Object::Dictionary(dict! {
            "Type" => Object::name("Pages"),
            "Kids" => Object::Array(Vec::new()),
            "Count" => Object::Integer(0),
        }));
        let catalog = store.add_object(Object::Dictionary(dict! {
            "Type" => Object::name("Catalog"),
            "Pages" => Object::Reference(pages),
        }));
        store.trailer_mut().insert("Root".into(), Object::Reference(catalog));
        Self::from_state(DocumentState {
            store,
            version: NEW_DOCUMENT_VERSION,
            pages: None,
            fonts,
        })
    }

    fn from_state(state: DocumentState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// The state is plain data, so a panic in another holder leaves nothing
    /// half-built that a later caller could observe.
    fn lock(&self) -> MutexGuard<'_, DocumentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Encryption
    // ------------------------------------------------------------------

    /// Report whether the file at `path` is encrypted, without opening it.
    pub fn is_encrypted_file(path: impl AsRef<Path>) -> Result<bool> {
        let mut source = FileSource::open(path)?;
        Self::probe_encrypted(&mut source)
    }

    /// Report whether the trailer of `source` carries `/Encrypt`.
    pub fn probe_encrypted(source: &mut dyn ByteSource) -> Result<bool> {
        let options = OpenOptions::default();
        xref::find_header(source)?;
        let load = match xref::load(source, &options) {
            Ok(load) => load,
            Err(e) => {
                log::debug!("Probe could not read cross-reference data ({}); scanning", e);
                xref_reconstruction::reconstruct(source, &options)?
            },
        };
        Ok(load.trailer.contains_key("Encrypt"))
    }

    /// True when the trailer has an `/Encrypt` entry.
    pub fn is_encrypted(&self) -> bool {
        self.lock().store.security().is_some()
    }

    /// True when content is readable: either the document is not
    /// encrypted or a password has been accepted.
    pub fn is_authenticated(&self) -> bool {
        self.lock().store.is_decryptable()
    }

    /// Try another password. Returns whether it was accepted.
    ///
    /// Always false for unencrypted documents.
    pub fn authenticate(&self, password: &[u8]) -> bool {
        self.lock().store.authenticate(password)
    }

    /// Permission flags from `/P`; everything for unencrypted documents.
    pub fn permissions(&self) -> Permissions {
        self.lock()
            .store
            .security()
            .map_or(Permissions::all(), SecurityHandler::permissions)
    }

    // ------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------

    /// Header version.
    pub fn version(&self) -> (u8, u8) {
        self.lock().version
    }

    /// Copy of the current trailer.
    pub fn trailer(&self) -> Dictionary {
        self.lock().store.trailer().clone()
    }

    /// Number of objects in use.
    pub fn object_count(&self) -> usize {
        self.lock().store.object_count()
    }

    /// Cross-reference entry for an object number.
    pub fn reference_entry(&self, number: u32) -> Option<XRefEntry> {
        self.lock().store.entry(number)
    }

    /// Resolve a reference; [`Object::Undefined`] when it does not resolve.
    pub fn get_object(&self, reference: ObjectRef) -> Object {
        self.lock().store.get_object(reference)
    }

    /// Replace an existing object.
    pub fn set_object(&self, reference: ObjectRef, obj: Object) -> Result<()> {
        let mut state = self.lock();
        state.store.set_object(reference, obj)?;
        state.pages = None;
        Ok(())
    }

    /// Add a new object and return its reference.
    pub fn add_object(&self, obj: Object) -> ObjectRef {
        let mut state = self.lock();
        state.pages = None;
        state.store.add_object(obj)
    }

    /// Free an object.
    pub fn delete_object(&self, reference: ObjectRef) -> Result<()> {
        let mut state = self.lock();
        state.store.delete_object(reference)?;
        state.pages = None;
        Ok(())
    }

    /// Decrypt and decode the stream object `reference` through its filter
    /// chain.
    pub fn decode_stream(&self, reference: ObjectRef) -> Result<DecodedStream> {
        let mut state = self.lock();
        match state.store.get_object(reference) {
            Object::Stream(stream) => state.store.decode_stream(&stream, reference),
            Object::Undefined => Err(Error::UnresolvedReference(reference)),
            other => Err(Error::InvalidObjectType {
                expected: "Stream".into(),
                found: other.type_name().into(),
            }),
        }
    }

    /// Drop cached objects older than their time-to-live. Returns how many
    /// entries were evicted.
    pub fn purge_caches(&self) -> usize {
        self.lock().store.purge_caches()
    }

    // ------------------------------------------------------------------
    // Pages
    // ------------------------------------------------------------------

    /// Number of pages.
    pub fn page_count(&self) -> Result<usize> {
        self.lock().with_tree(|tree, store| Ok(tree.page_count(store)))
    }

    /// Page `index` with its inherited attributes resolved.
    pub fn get_page(&self, index: usize) -> Result<Page> {
        self.lock().with_tree(|tree, store| tree.page(store, index))
    }

    /// Insert a page at `index` showing a JPEG image at its natural size,
    /// one point per pixel.
    ///
    /// The image, the content stream and the page are all new objects.
    pub fn insert_image_page(&self, index: usize, jpeg: &[u8]) -> Result<ObjectRef> {
        let info = probe_jpeg(jpeg)?;
        let color_space = match info.components {
            1 => "DeviceGray",
            3 => "DeviceRGB",
            _ => "DeviceCMYK",
        };

        let mut state = self.lock();
        state.with_tree(|tree, store| {
            let image = store.add_object(Object::Stream(Stream::new(
                dict! {
                    "Type" => Object::name("XObject"),
                    "Subtype" => Object::name("Image"),
                    "Width" => Object::from_i64(info.width as i64),
                    "Height" => Object::from_i64(info.height as i64),
                    "ColorSpace" => Object::name(color_space),
                    "BitsPerComponent" => Object::Integer(8),
                    "Filter" => Object::name("DCTDecode"),
                },
                jpeg.to_vec(),
            )));
            let program = format!("q {} 0 0 {} 0 0 cm /Im0 Do Q", info.width, info.height);
            let contents = store.add_object(Object::Stream(Stream::new(Dictionary::new(), program.into_bytes())));

            let page = dict! {
                "MediaBox" => Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::from_i64(info.width as i64),
                    Object::from_i64(info.height as i64),
                ]),
                "Resources" => Object::Dictionary(dict! {
                    "XObject" => Object::Dictionary(dict! { "Im0" => Object::Reference(image) }),
                }),
                "Contents" => Object::Reference(contents),
            };
            let reference = tree.insert_page(store, index, page)?;
            log::info!(
                "Inserted {}x{} image page {} at index {}",
                info.width,
                info.height,
                reference,
                index
            );
            Ok(reference)
        })
    }

    /// Remove page `index` along with the objects only it used.
    ///
    /// Returns the number of objects freed, the page included.
    pub fn delete_page(&self, index: usize) -> Result<usize> {
        self.lock().with_tree(|tree, store| tree.delete_page(store, index))
    }

    /// Run the content of page `index` against `device`.
    pub fn render_page(&self, index: usize, device: &mut dyn Device) -> Result<()> {
        let mut guard = self.lock();
        let page = guard.with_tree(|tree, store| tree.page(store, index))?;
        let state = &mut *guard;
        content::render_page(&mut state.store, &state.fonts, &page, device)
    }

    // ------------------------------------------------------------------
    // Saving
    // ------------------------------------------------------------------

    /// Write the whole document to `out`.
    pub fn save<W: Write>(&self, out: &mut W, options: &SaveOptions) -> Result<()> {
        let mut state = self.lock();
        let version = state.version;
        write_document(&mut state.store, version, options, out)
    }

    /// Write the whole document to a file, replacing it.
    pub fn save_to_file(&self, path: impl AsRef<Path>, options: &SaveOptions) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.save(&mut out, options)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Load cross-reference data and build the store, scanning the file when
/// the `startxref` chain is unreadable or leads to no catalog.
fn load_store(mut source: Box<dyn ByteSource>, options: &OpenOptions) -> Result<ObjectStore> {
    let loaded = match xref::load(source.as_mut(), options) {
        Ok(load) => Some(load),
        Err(e) if options.strict => return Err(e),
        Err(e) => {
            log::warn!("Cross-reference data unreadable ({}); scanning the file", e);
            None
        },
    };

    if let Some(load) = loaded {
        let mut store = ObjectStore::new(source, options.clone(), load);
        if has_catalog(&mut store) {
            return Ok(store);
        }
        if options.strict {
            return Err(Error::StructuralInvariantViolation("trailer has no usable /Root".into()));
        }
        log::warn!("Trailer /Root does not lead to a catalog; scanning the file");
        source = store.into_source();
    }

    let load: XRefLoad = xref_reconstruction::reconstruct(source.as_mut(), options)?;
    let mut store = ObjectStore::new(source, options.clone(), load);
    if !has_catalog(&mut store) {
        return Err(Error::StructuralInvariantViolation("no catalog found".into()));
    }
    Ok(store)
}

fn has_catalog(store: &mut ObjectStore) -> bool {
    match store.trailer().get("Root").cloned() {
        Some(root) => store.resolve_dict(&root).is_some_and(|d| d.contains_key("Pages")),
        None => false,
    }
}

/// Install the security handler and try the password.
fn init_security(store: &mut ObjectStore, encrypt: &Object, password: Option<&[u8]>) -> Result<()> {
    let encrypt_dict = store.resolve(encrypt);
    let id = store.trailer().get("ID").cloned();
    let file_id = match id.map(|id| store.resolve(&id)) {
        Some(Object::Array(items)) => match items.first() {
            Some(Object::String(first)) => first.clone(),
            _ => Vec::new(),
        },
        _ => {
            log::warn!("Encrypted document has no /ID; keys are derived from an empty identifier");
            Vec::new()
        },
    };

    let handler = SecurityHandler::from_object(&encrypt_dict, file_id)?;
    store.set_security(handler, encrypt.as_reference());
    if !store.authenticate(password.unwrap_or(b"")) {
        log::warn!("Document is encrypted and the password was not accepted; payloads stay encrypted");
    }
    Ok(())
}

/// Catalog `/Pages` reference.
fn pages_root(store: &mut ObjectStore) -> Result<ObjectRef> {
    let root = store
        .trailer()
        .get("Root")
        .cloned()
        .ok_or_else(|| Error::StructuralInvariantViolation("trailer has no /Root".into()))?;
    let catalog = store
        .resolve_dict(&root)
        .ok_or_else(|| Error::StructuralInvariantViolation("/Root is not a dictionary".into()))?;
    catalog
        .get("Pages")
        .and_then(Object::as_reference)
        .ok_or_else(|| Error::StructuralInvariantViolation("catalog /Pages is not a reference".into()))
}
