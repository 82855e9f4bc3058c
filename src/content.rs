mod gateway;
mod model;
pub mod normalize;
mod samples;

pub use self::{
    gateway::{AuthEndpoint, CATEGORIES_LIMIT, CmsGateway, MAX_PER_PAGE, TAGS_LIMIT},
    model::{Author, Page, Post, RawPage, RawPost, RawTerm, Term, TextField},
    samples::SampleData,
};
