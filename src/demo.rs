//! 示例实体模型：任务跟踪系统
//!
//! 命令行、基准测试和测试共用这一组实体。
//!
//! ```text
//! Project ──Tasks──▶ Task ──Owner──▶ User ──Department──▶ Department
//!                     │
//!                     └──Tags──▶ Tag
//!
//! Attachment ──Task──▶ Task
//!     └──Parent──▶ Attachment      (GUID 主键)
//! ```

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{
    Entity, EntityDescriptor, Enumerated, Field, Many, ModelRegistry, PropertyDescriptor, Ref,
    ValueType,
};

pub const TASK_STATUSES: &[&str] = &["Open", "InProgress", "Closed"];

pub struct Task;

impl Task {
    pub const ID: Field<Task, i64> = Field::new("Id");
    pub const NAME: Field<Task, String> = Field::new("Name");
    pub const SUMMARY: Field<Task, String> = Field::new("Summary");
    pub const PRIORITY: Field<Task, i64> = Field::new("Priority");
    pub const ESTIMATE: Field<Task, f64> = Field::new("Estimate");
    pub const DONE: Field<Task, bool> = Field::new("Done");
    pub const DUE_DATE: Field<Task, DateTime<Utc>> = Field::new("DueDate");
    pub const CREATED_AT: Field<Task, DateTime<Utc>> = Field::new("CreatedAt");
    pub const STATUS: Field<Task, Enumerated> = Field::new("Status");
    pub const OWNER: Field<Task, Ref<User>> = Field::new("Owner");
    pub const PROJECT: Field<Task, Ref<Project>> = Field::new("Project");
    pub const TAGS: Field<Task, Many<Tag>> = Field::new("Tags");
}

impl Entity for Task {
    const ENTITY: &'static str = "Task";

    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new(Self::ENTITY, "Id")
            .with(PropertyDescriptor::value("Id", ValueType::Int))
            .with(PropertyDescriptor::text("Name"))
            // 计算属性，没有对应的列
            .with(PropertyDescriptor::text("Summary").not_mapped())
            .with(PropertyDescriptor::value("Priority", ValueType::Int))
            .with(PropertyDescriptor::value("Estimate", ValueType::Float))
            .with(PropertyDescriptor::value("Done", ValueType::Bool))
            .with(PropertyDescriptor::value("DueDate", ValueType::DateTime))
            .with(PropertyDescriptor::value("CreatedAt", ValueType::DateTime).timestamp())
            .with(PropertyDescriptor::value("Status", ValueType::Enum(TASK_STATUSES)))
            .with(PropertyDescriptor::reference("Owner", "User", "OwnerId"))
            .with(PropertyDescriptor::reference("Project", "Project", "ProjectId"))
            .with(PropertyDescriptor::collection("Tags", "Tag", "TaskId"))
    }
}

pub struct User;

impl User {
    pub const ID: Field<User, i64> = Field::new("Id");
    pub const NAME: Field<User, String> = Field::new("Name");
    pub const DEPARTMENT: Field<User, Ref<Department>> = Field::new("Department");
}

impl Entity for User {
    const ENTITY: &'static str = "User";

    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new(Self::ENTITY, "Id")
            .with(PropertyDescriptor::value("Id", ValueType::Int))
            .with(PropertyDescriptor::text("Name"))
            .with(PropertyDescriptor::reference("Department", "Department", "DepartmentId"))
    }
}

pub struct Department;

impl Department {
    pub const NAME: Field<Department, String> = Field::new("Name");
}

impl Entity for Department {
    const ENTITY: &'static str = "Department";

    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new(Self::ENTITY, "Id")
            .with(PropertyDescriptor::value("Id", ValueType::Int))
            .with(PropertyDescriptor::text("Name"))
    }
}

pub struct Tag;

impl Tag {
    pub const NAME: Field<Tag, String> = Field::new("Name");
}

impl Entity for Tag {
    const ENTITY: &'static str = "Tag";

    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new(Self::ENTITY, "Id")
            .with(PropertyDescriptor::value("Id", ValueType::Int))
            .with(PropertyDescriptor::text("Name"))
            .with(PropertyDescriptor::reference("Task", "Task", "TaskId"))
    }
}

pub struct Project;

impl Project {
    pub const NAME: Field<Project, String> = Field::new("Name");
    pub const TASKS: Field<Project, Many<Task>> = Field::new("Tasks");
}

impl Entity for Project {
    const ENTITY: &'static str = "Project";

    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new(Self::ENTITY, "Id")
            .with(PropertyDescriptor::value("Id", ValueType::Int))
            .with(PropertyDescriptor::text("Name"))
            .with(PropertyDescriptor::collection("Tasks", "Task", "ProjectId"))
    }
}

pub struct Attachment;

impl Attachment {
    pub const ID: Field<Attachment, Uuid> = Field::new("Id");
    pub const NAME: Field<Attachment, String> = Field::new("Name");
    pub const PARENT: Field<Attachment, Ref<Attachment>> = Field::new("Parent");
    pub const TASK: Field<Attachment, Ref<Task>> = Field::new("Task");
}

impl Entity for Attachment {
    const ENTITY: &'static str = "Attachment";

    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new(Self::ENTITY, "Id")
            .with(PropertyDescriptor::value("Id", ValueType::Uuid))
            .with(PropertyDescriptor::text("Name"))
            .with(PropertyDescriptor::reference("Parent", "Attachment", "ParentId"))
            .with(PropertyDescriptor::reference("Task", "Task", "TaskId"))
    }
}

/// 注册全部示例实体
pub fn registry() -> ModelRegistry {
    ModelRegistry::new()
        .register::<Task>()
        .register::<User>()
        .register::<Department>()
        .register::<Tag>()
        .register::<Project>()
        .register::<Attachment>()
}
