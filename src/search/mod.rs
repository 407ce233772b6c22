pub mod availability;
pub mod controller;
pub mod presenter;
pub mod session;
pub mod shops;

pub use availability::Availability;
pub use controller::{PollSettings, SearchController, SearchUpdate, WorkerEvent};
pub use presenter::{
    AddControl, PAGE_SIZE, PageView, PresentOptions, ProductCard, ResultsView, ShopBody, ShopView,
    present,
};
pub use session::{Filters, PageDirection, Phase, SearchError, SearchSession, SortMode};
pub use shops::ShopNames;
